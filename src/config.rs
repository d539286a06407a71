//! Application configuration.
//!
//! Loaded once from YAML and threaded explicitly into the orchestrator,
//! stages, and adapters as a plain value. There is no process-wide
//! configuration state.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::core::error::PipelineError;

/// Configuration for a deckforge instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeckConfig {
    /// Personas driving each generative stage
    #[serde(default)]
    pub personas: Personas,

    /// Concurrency ceiling for fan-out stages
    #[serde(default = "default_concurrency")]
    pub concurrency_level: usize,

    /// Completion backend settings
    #[serde(default)]
    pub completion: CompletionConfig,

    /// External tool settings
    #[serde(default)]
    pub tools: ToolsConfig,
}

fn default_concurrency() -> usize {
    10
}

impl Default for DeckConfig {
    fn default() -> Self {
        Self {
            personas: Personas::default(),
            concurrency_level: default_concurrency(),
            completion: CompletionConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

impl DeckConfig {
    /// Load configuration from a YAML file
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::ConfigInvalid(format!(
                "failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content
    pub fn from_yaml(content: &str) -> Result<Self, PipelineError> {
        let config: DeckConfig = serde_yaml::from_str(content)
            .map_err(|e| PipelineError::ConfigInvalid(format!("invalid config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.concurrency_level == 0 {
            return Err(PipelineError::ConfigInvalid(
                "concurrency_level must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// A role/goal/backstory persona rendered into system instructions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Persona {
    pub role: String,
    pub goal: String,
    pub backstory: String,
}

impl Persona {
    pub fn new(role: &str, goal: &str, backstory: &str) -> Self {
        Self {
            role: role.to_string(),
            goal: goal.to_string(),
            backstory: backstory.to_string(),
        }
    }

    /// Render this persona as system instructions
    pub fn prompt(&self) -> String {
        format!(
            "You are {}.\nYour goal: {}\nBackground: {}",
            self.role, self.goal, self.backstory
        )
    }
}

/// The personas used by the generative stages
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Personas {
    #[serde(default = "default_planner")]
    pub planner: Persona,

    #[serde(default = "default_researcher")]
    pub researcher: Persona,

    #[serde(default = "default_creator")]
    pub creator: Persona,

    #[serde(default = "default_illustrator")]
    pub illustrator: Persona,
}

fn default_planner() -> Persona {
    Persona::new(
        "a presentation planner",
        "break a presentation brief into focused research topics",
        "You have planned hundreds of conference talks and know how to scope research",
    )
}

fn default_researcher() -> Persona {
    Persona::new(
        "a diligent researcher",
        "produce accurate, source-backed findings on one topic",
        "You verify claims against the given references before the open web",
    )
}

fn default_creator() -> Persona {
    Persona::new(
        "a slide deck author",
        "turn research into a clear, well-paced Marp deck",
        "You write tight slides with one idea per slide",
    )
}

fn default_illustrator() -> Persona {
    Persona::new(
        "a slide illustrator",
        "add an image only where it strengthens a slide",
        "You know most slides are better without decoration",
    )
}

impl Default for Personas {
    fn default() -> Self {
        Self {
            planner: default_planner(),
            researcher: default_researcher(),
            creator: default_creator(),
            illustrator: default_illustrator(),
        }
    }
}

/// Completion backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    /// OpenAI-compatible chat completions endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Maximum attempts per completion call (including the first)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial retry delay in milliseconds
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_api_key_env() -> String {
    "DECKFORGE_API_KEY".to_string()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_retry_delay() -> u64 {
    1000
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

/// External tool settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Graphviz binary
    #[serde(default = "default_dot_binary")]
    pub dot_binary: String,

    /// Marp CLI binary
    #[serde(default = "default_marp_binary")]
    pub marp_binary: String,

    /// Timeout for external tool invocations, in seconds
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout_seconds: u64,
}

fn default_dot_binary() -> String {
    "dot".to_string()
}
fn default_marp_binary() -> String {
    "marp".to_string()
}
fn default_tool_timeout() -> u64 {
    120
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            dot_binary: default_dot_binary(),
            marp_binary: default_marp_binary(),
            tool_timeout_seconds: default_tool_timeout(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DeckConfig::default();

        assert_eq!(config.concurrency_level, 10);
        assert_eq!(config.tools.dot_binary, "dot");
        assert_eq!(config.completion.max_attempts, 3);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = DeckConfig::from_yaml(
            r#"
concurrency_level: 4
completion:
  model: local-model
  endpoint: http://localhost:8080/v1/chat/completions
"#,
        )
        .unwrap();

        assert_eq!(config.concurrency_level, 4);
        assert_eq!(config.completion.model, "local-model");
        // Untouched sections keep their defaults.
        assert_eq!(config.tools.marp_binary, "marp");
        assert!(config.personas.planner.role.contains("planner"));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let result = DeckConfig::from_yaml("concurrency_level: 0");
        assert!(matches!(result, Err(PipelineError::ConfigInvalid(_))));
    }

    #[test]
    fn test_persona_prompt() {
        let persona = Persona::new("a tester", "test things", "You test");
        let prompt = persona.prompt();
        assert!(prompt.contains("You are a tester"));
        assert!(prompt.contains("Your goal: test things"));
    }
}
