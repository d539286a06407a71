//! Reference descriptors for grounding generation.
//!
//! A reference is a tagged descriptor of external material (a repository, a
//! web page, an API surface). Each kind resolves to a uniform [`Grounding`]
//! that is folded into prompts. Adding a kind means adding a variant and its
//! resolver; callers only see `resolve()`.

use serde::{Deserialize, Serialize};

/// Serializable reference to external material
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ReferenceSpec {
    /// A git repository to consult for code examples
    Git {
        url: String,
        #[serde(default)]
        description: Option<String>,
    },

    /// A web page to consult
    Webpage {
        url: String,
        #[serde(default)]
        description: Option<String>,
    },

    /// An API surface, restricted to the named packages
    Api {
        name: String,
        description: String,
        #[serde(default)]
        accepted_packages: Vec<String>,
    },
}

impl ReferenceSpec {
    /// Resolve this reference into prompt-ready grounding
    pub fn resolve(&self) -> Grounding {
        match self {
            ReferenceSpec::Git { url, description } => Grounding {
                name: url.clone(),
                description: description
                    .clone()
                    .unwrap_or_else(|| format!("Git repository at {url}")),
                notes: "Prefer code examples found in this repository over the web".to_string(),
            },
            ReferenceSpec::Webpage { url, description } => Grounding {
                name: url.clone(),
                description: description
                    .clone()
                    .unwrap_or_else(|| format!("Web page at {url}")),
                notes: "Refer to this web page".to_string(),
            },
            ReferenceSpec::Api {
                name,
                description,
                accepted_packages,
            } => Grounding {
                name: name.clone(),
                description: description.clone(),
                notes: if accepted_packages.is_empty() {
                    "Refer to this API".to_string()
                } else {
                    format!("Refer to this API, packages: {}", accepted_packages.join(", "))
                },
            },
        }
    }
}

/// Uniform grounding material produced from a reference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grounding {
    pub name: String,
    pub description: String,
    pub notes: String,
}

impl Grounding {
    /// Render this grounding as a prompt fragment
    pub fn as_prompt_fragment(&self) -> String {
        format!("- {} ({}): {}", self.name, self.description, self.notes)
    }
}

/// Resolve a list of references into a single prompt context block
pub fn grounding_block(references: &[ReferenceSpec]) -> String {
    if references.is_empty() {
        return String::new();
    }
    let lines: Vec<String> = references
        .iter()
        .map(|r| r.resolve().as_prompt_fragment())
        .collect();
    format!("References:\n{}", lines.join("\n"))
}
