//! Stage and pipeline definitions.
//!
//! A stage is a function from named inputs to a named output, with an
//! optional checkpoint that both persists the output and allows the stage
//! to be skipped on resume. Stages declare their dependencies by name;
//! the pipeline validates at construction time that every declared input
//! is produced by an earlier stage. A later stage may re-bind a name, and
//! resolution always yields the most recently bound value.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{ResearchResult, SlideDeck, Topic};

use super::error::PipelineError;
use super::expand::RenderWarning;

/// A value flowing between stages under a binding name
#[derive(Debug, Clone)]
pub enum BindingValue {
    /// Planned research topics
    Topics(Vec<Topic>),

    /// Collected research reports
    Research(ResearchResult),

    /// The deck under construction
    Deck(SlideDeck),

    /// Path of a produced artifact
    Artifact(std::path::PathBuf),
}

impl BindingValue {
    pub fn kind(&self) -> &'static str {
        match self {
            BindingValue::Topics(_) => "topics",
            BindingValue::Research(_) => "research",
            BindingValue::Deck(_) => "deck",
            BindingValue::Artifact(_) => "artifact",
        }
    }

    /// Serialized form used when a stage persists this value as a checkpoint
    pub fn encode(&self) -> String {
        match self {
            BindingValue::Deck(deck) => deck.serialize(),
            BindingValue::Topics(topics) => {
                serde_json::to_string_pretty(topics).unwrap_or_default()
            }
            BindingValue::Research(research) => {
                serde_json::to_string_pretty(research).unwrap_or_default()
            }
            BindingValue::Artifact(path) => path.display().to_string(),
        }
    }
}

/// The run-scoped name → value table
#[derive(Debug, Default)]
pub struct Bindings {
    values: HashMap<String, BindingValue>,
}

impl Bindings {
    /// Bind a value under a name, replacing any earlier binding
    pub fn bind(&mut self, name: &str, value: BindingValue) {
        self.values.insert(name.to_string(), value);
    }

    /// Most recently bound value under this name
    pub fn get(&self, name: &str) -> Result<&BindingValue, PipelineError> {
        self.values
            .get(name)
            .ok_or_else(|| PipelineError::MissingBinding(name.to_string()))
    }

    pub fn topics(&self, name: &str) -> Result<&[Topic], PipelineError> {
        match self.get(name)? {
            BindingValue::Topics(topics) => Ok(topics),
            other => Err(self.kind_mismatch(name, "topics", other)),
        }
    }

    pub fn research(&self, name: &str) -> Result<&ResearchResult, PipelineError> {
        match self.get(name)? {
            BindingValue::Research(research) => Ok(research),
            other => Err(self.kind_mismatch(name, "research", other)),
        }
    }

    pub fn deck(&self, name: &str) -> Result<&SlideDeck, PipelineError> {
        match self.get(name)? {
            BindingValue::Deck(deck) => Ok(deck),
            other => Err(self.kind_mismatch(name, "deck", other)),
        }
    }

    fn kind_mismatch(&self, name: &str, expected: &str, got: &BindingValue) -> PipelineError {
        PipelineError::MissingBinding(format!(
            "{name} (holds {}, expected {expected})",
            got.kind()
        ))
    }
}

/// What a stage produced: the output value plus any recorded warnings
pub struct StageOutcome {
    pub value: BindingValue,
    pub warnings: Vec<RenderWarning>,
}

impl StageOutcome {
    pub fn new(value: BindingValue) -> Self {
        Self {
            value,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(value: BindingValue, warnings: Vec<RenderWarning>) -> Self {
        Self { value, warnings }
    }
}

/// A named step in the pipeline with declared input/output bindings
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name (unique within a pipeline)
    fn name(&self) -> &str;

    /// Binding names this stage depends on
    fn inputs(&self) -> &[&str] {
        &[]
    }

    /// Binding name this stage produces
    fn output(&self) -> &str;

    /// Checkpoint file name, for stages that persist their output and can
    /// be skipped when the checkpoint already exists
    fn checkpoint_file(&self) -> Option<String> {
        None
    }

    /// Parse checkpoint content back into this stage's output binding
    fn restore(&self, _content: &str) -> Result<BindingValue, PipelineError> {
        Err(PipelineError::ConfigInvalid(format!(
            "stage '{}' does not support checkpoint restore",
            self.name()
        )))
    }

    /// Execute against resolved inputs
    async fn run(&self, bindings: &Bindings) -> Result<StageOutcome, PipelineError>;
}

/// An ordered, validated chain of stages
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    /// Build a pipeline, rejecting stages whose declared inputs are not
    /// produced by an earlier stage.
    pub fn new(stages: Vec<Arc<dyn Stage>>) -> Result<Self, PipelineError> {
        if stages.is_empty() {
            return Err(PipelineError::ConfigInvalid(
                "pipeline must have at least one stage".to_string(),
            ));
        }

        let mut bound: Vec<&str> = Vec::new();
        for stage in &stages {
            for input in stage.inputs() {
                if !bound.contains(input) {
                    return Err(PipelineError::MissingBinding(format!(
                        "stage '{}' declares input '{input}' that no earlier stage produces",
                        stage.name()
                    )));
                }
            }
            bound.push(stage.output());
        }

        Ok(Self { stages })
    }

    pub fn stages(&self) -> &[Arc<dyn Stage>] {
        &self.stages
    }

    /// Binding name of the final stage's output
    pub fn final_output(&self) -> &str {
        // Pipeline::new rejects empty stage lists
        self.stages
            .last()
            .map(|s| s.output())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeStage {
        name: &'static str,
        inputs: Vec<&'static str>,
        output: &'static str,
    }

    #[async_trait]
    impl Stage for FakeStage {
        fn name(&self) -> &str {
            self.name
        }
        fn inputs(&self) -> &[&str] {
            &self.inputs
        }
        fn output(&self) -> &str {
            self.output
        }
        async fn run(&self, _bindings: &Bindings) -> Result<StageOutcome, PipelineError> {
            Ok(StageOutcome::new(BindingValue::Topics(Vec::new())))
        }
    }

    fn stage(name: &'static str, inputs: Vec<&'static str>, output: &'static str) -> Arc<dyn Stage> {
        Arc::new(FakeStage {
            name,
            inputs,
            output,
        })
    }

    #[test]
    fn test_valid_chain() {
        let pipeline = Pipeline::new(vec![
            stage("plan", vec![], "topics"),
            stage("research", vec!["topics"], "research"),
            stage("synthesize", vec!["research"], "deck"),
        ])
        .unwrap();

        assert_eq!(pipeline.stages().len(), 3);
        assert_eq!(pipeline.final_output(), "deck");
    }

    #[test]
    fn test_dangling_input_rejected() {
        let result = Pipeline::new(vec![
            stage("plan", vec![], "topics"),
            stage("synthesize", vec!["research"], "deck"),
        ]);

        assert!(matches!(result, Err(PipelineError::MissingBinding(_))));
    }

    #[test]
    fn test_forward_reference_rejected() {
        let result = Pipeline::new(vec![
            stage("research", vec!["topics"], "research"),
            stage("plan", vec![], "topics"),
        ]);

        assert!(matches!(result, Err(PipelineError::MissingBinding(_))));
    }

    #[test]
    fn test_rebinding_is_allowed() {
        let pipeline = Pipeline::new(vec![
            stage("synthesize", vec![], "deck"),
            stage("expand", vec!["deck"], "deck"),
            stage("illustrate", vec!["deck"], "deck"),
        ]);

        assert!(pipeline.is_ok());
    }

    #[test]
    fn test_empty_pipeline_rejected() {
        assert!(Pipeline::new(Vec::new()).is_err());
    }

    #[test]
    fn test_most_recent_binding_wins() {
        let mut bindings = Bindings::default();
        bindings.bind("deck", BindingValue::Deck(SlideDeck::parse("# One")));
        bindings.bind("deck", BindingValue::Deck(SlideDeck::parse("# Two")));

        let deck = bindings.deck("deck").unwrap();
        assert!(deck.slides()[0].content.contains("Two"));
    }

    #[test]
    fn test_kind_mismatch_is_error() {
        let mut bindings = Bindings::default();
        bindings.bind("topics", BindingValue::Topics(Vec::new()));

        assert!(bindings.deck("topics").is_err());
    }
}
