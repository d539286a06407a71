//! The request describing a single deck-building run.
//!
//! A request is deserialized once from YAML, validated up front, and never
//! mutated afterwards. Interim checkpoint file names are derived from the
//! output file name by suffix substitution.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::reference::ReferenceSpec;
use crate::core::error::PipelineError;

/// A request to build a slide deck
///
/// # Example YAML
///
/// ```yaml
/// brief: Introduce the team to our new event pipeline
/// presenter_bio: Staff engineer on the platform team
/// slide_count: 12
/// output_directory: ./out
/// output_file: pipeline-intro.md
/// header: |
///   marp: true
///   theme: default
/// references:
///   - type: git
///     url: https://github.com/example/pipeline
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckRequest {
    /// The content of the presentation. Can be short or detailed.
    pub brief: String,

    /// About the presenter
    pub presenter_bio: String,

    /// Target number of slides
    pub slide_count: u32,

    /// Reference material to ground research and deck creation
    #[serde(default)]
    pub references: Vec<ReferenceSpec>,

    /// Directory receiving the deck and its interim checkpoints
    pub output_directory: String,

    /// Final markdown file name
    #[serde(default = "default_output_file")]
    pub output_file: String,

    /// Marp front matter prepended to the generated deck
    #[serde(default)]
    pub header: String,

    /// Named images the creator may place on slides
    #[serde(default)]
    pub images: HashMap<String, ImageInfo>,

    /// Ask the model to add illustrations per slide. Not yet dependable.
    #[serde(default)]
    pub auto_illustrate: bool,

    /// Upper bound on each research report's length in words (excluding links)
    #[serde(default = "default_report_max_words")]
    pub research_report_max_words: u32,
}

fn default_output_file() -> String {
    "presentation.md".to_string()
}

fn default_report_max_words() -> u32 {
    300
}

impl DeckRequest {
    /// Parse a request from YAML content
    pub fn from_yaml(content: &str) -> Result<Self, PipelineError> {
        let request: DeckRequest = serde_yaml::from_str(content)
            .map_err(|e| PipelineError::ConfigInvalid(format!("invalid deck request: {e}")))?;
        request.validate()?;
        Ok(request)
    }

    /// Validate fields that serde cannot check
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.brief.trim().is_empty() {
            return Err(PipelineError::ConfigInvalid(
                "brief must not be empty".to_string(),
            ));
        }
        if self.slide_count == 0 {
            return Err(PipelineError::ConfigInvalid(
                "slide_count must be positive".to_string(),
            ));
        }
        if !self.output_file.ends_with(".md") {
            return Err(PipelineError::ConfigInvalid(format!(
                "output_file must end in .md, got '{}'",
                self.output_file
            )));
        }
        Ok(())
    }

    /// File name for the interim artifact holding the raw deck
    pub fn raw_output_file(&self) -> String {
        self.output_file.replace(".md", ".raw.md")
    }

    /// File name for the interim artifact with diagrams expanded
    pub fn with_diagrams_output_file(&self) -> String {
        self.output_file.replace(".md", ".withDiagrams.md")
    }

    /// Absolute-or-relative path of the final markdown output
    pub fn output_path(&self) -> PathBuf {
        PathBuf::from(&self.output_directory).join(&self.output_file)
    }
}

/// An image the deck creator may use, with a hint about when
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageInfo {
    pub url: String,
    pub use_when: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST_YAML: &str = r#"
brief: Introduce the event pipeline
presenter_bio: Platform engineer
slide_count: 10
output_directory: ./out
output_file: deck.md
header: "marp: true"
references:
  - type: webpage
    url: https://example.com/docs
"#;

    #[test]
    fn test_request_parsing() {
        let request = DeckRequest::from_yaml(REQUEST_YAML).unwrap();

        assert_eq!(request.slide_count, 10);
        assert_eq!(request.output_file, "deck.md");
        assert_eq!(request.references.len(), 1);
        assert!(!request.auto_illustrate);
        assert_eq!(request.research_report_max_words, 300);
    }

    #[test]
    fn test_checkpoint_file_naming() {
        let request = DeckRequest::from_yaml(REQUEST_YAML).unwrap();

        assert_eq!(request.raw_output_file(), "deck.raw.md");
        assert_eq!(request.with_diagrams_output_file(), "deck.withDiagrams.md");
    }

    #[test]
    fn test_missing_required_field() {
        let yaml = "brief: only a brief";
        assert!(matches!(
            DeckRequest::from_yaml(yaml),
            Err(PipelineError::ConfigInvalid(_))
        ));
    }

    #[test]
    fn test_zero_slide_count_rejected() {
        let yaml = REQUEST_YAML.replace("slide_count: 10", "slide_count: 0");
        assert!(DeckRequest::from_yaml(&yaml).is_err());
    }
}
