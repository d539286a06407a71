//! Research planning and reporting types.
//!
//! The planning stage produces [`Topic`]s; the research fan-out produces one
//! [`Report`] per topic, index-aligned with the topic list.

use serde::{Deserialize, Serialize};

/// A unit of research: a short label plus guiding questions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    /// Short topic label
    pub topic: String,

    /// Questions the research should answer
    #[serde(default)]
    pub questions: Vec<String>,
}

/// Research findings for one topic
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    /// The topic this report covers
    pub topic: String,

    /// Bounded-length prose findings
    pub content: String,

    /// Supporting links
    #[serde(default)]
    pub links: Vec<String>,
}

/// The complete research output for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchResult {
    /// One report per planned topic, in topic order
    pub topic_reports: Vec<Report>,
}
