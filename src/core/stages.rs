//! The concrete deck-building stages.
//!
//! Fixed order: plan → research → synthesize → expand → illustrate →
//! format. `synthesize` and `expand` are checkpoint-bearing, so an
//! interrupted run resumes from the last persisted deck instead of
//! regenerating it.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use crate::adapters::{CompletionClient, CompletionRequest, DotRenderer, SlideFormatter};
use crate::config::DeckConfig;
use crate::domain::{grounding_block, DeckRequest, Report, ResearchResult, SlideDeck, Topic};

use super::checkpoint::CheckpointStore;
use super::error::PipelineError;
use super::expand::expand_deck;
use super::fanout;
use super::pipeline::{BindingValue, Bindings, Pipeline, Stage, StageOutcome};

/// Build the deck pipeline for one request
pub fn deck_pipeline(
    request: Arc<DeckRequest>,
    config: Arc<DeckConfig>,
    completion: Arc<dyn CompletionClient>,
    renderer: Arc<dyn DotRenderer>,
    formatter: Arc<dyn SlideFormatter>,
    store: CheckpointStore,
) -> Result<Pipeline, PipelineError> {
    Pipeline::new(vec![
        Arc::new(PlanStage {
            request: Arc::clone(&request),
            config: Arc::clone(&config),
            completion: Arc::clone(&completion),
        }),
        Arc::new(ResearchStage {
            request: Arc::clone(&request),
            config: Arc::clone(&config),
            completion: Arc::clone(&completion),
        }),
        Arc::new(SynthesizeStage {
            request: Arc::clone(&request),
            config: Arc::clone(&config),
            completion: Arc::clone(&completion),
        }),
        Arc::new(ExpandStage {
            request: Arc::clone(&request),
            config: Arc::clone(&config),
            renderer,
        }),
        Arc::new(IllustrateStage {
            request: Arc::clone(&request),
            config,
            completion,
            store,
        }),
        Arc::new(FormatStage { request, formatter }),
    ])
}

/// Completion output is often wrapped in a markdown code fence; peel it off
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let Some((_, body)) = trimmed.split_once('\n') else {
        return trimmed;
    };
    body.trim_end()
        .strip_suffix("```")
        .unwrap_or(body)
        .trim()
}

/// Plan research topics from the request
struct PlanStage {
    request: Arc<DeckRequest>,
    config: Arc<DeckConfig>,
    completion: Arc<dyn CompletionClient>,
}

#[async_trait]
impl Stage for PlanStage {
    fn name(&self) -> &str {
        "plan"
    }

    fn output(&self) -> &str {
        "topics"
    }

    async fn run(&self, _bindings: &Bindings) -> Result<StageOutcome, PipelineError> {
        let prompt = format!(
            "Create a list of research topics for a presentation, based on the given input:\n\
             {brief}\n\
             About the presenter: {bio}\n\n\
             {grounding}\n\n\
             Respond with a JSON array of objects, each with a \"topic\" string \
             and a \"questions\" array of strings.",
            brief = self.request.brief,
            bio = self.request.presenter_bio,
            grounding = grounding_block(&self.request.references),
        );

        let text = self
            .completion
            .complete(CompletionRequest::new(
                self.config.personas.planner.prompt(),
                prompt,
            ))
            .await?;

        let topics: Vec<Topic> = serde_json::from_str(strip_code_fence(&text))
            .map_err(|e| PipelineError::Generation(format!("undecodable topic list: {e}")))?;
        if topics.is_empty() {
            return Err(PipelineError::Generation(
                "planner returned no topics".to_string(),
            ));
        }

        info!(count = topics.len(), "Planned research topics");
        Ok(StageOutcome::new(BindingValue::Topics(topics)))
    }
}

/// Research every planned topic through the bounded fan-out executor
struct ResearchStage {
    request: Arc<DeckRequest>,
    config: Arc<DeckConfig>,
    completion: Arc<dyn CompletionClient>,
}

#[async_trait]
impl Stage for ResearchStage {
    fn name(&self) -> &str {
        "research"
    }

    fn inputs(&self) -> &[&str] {
        &["topics"]
    }

    fn output(&self) -> &str {
        "research"
    }

    async fn run(&self, bindings: &Bindings) -> Result<StageOutcome, PipelineError> {
        let topics = bindings.topics("topics")?.to_vec();
        let grounding = grounding_block(&self.request.references);

        let topic_reports: Vec<Report> =
            fanout::map(topics, self.config.concurrency_level, |_, topic| {
                let grounding = grounding.clone();
                async move {
                    let prompt = format!(
                        "Given the following topic and the goal to create a presentation \
                         for this audience, create a research report with content of no \
                         more than {max_words} words (excluding links).\n\
                         Always look for material in the given references before the web.\n\
                         Topic: {topic}\n\
                         Questions:\n{questions}\n\n\
                         {grounding}\n\n\
                         Respond with a JSON object with \"topic\", \"content\" and \
                         \"links\" fields.",
                        max_words = self.request.research_report_max_words,
                        topic = topic.topic,
                        questions = topic.questions.join("\n"),
                    );

                    let text = self
                        .completion
                        .complete(CompletionRequest::new(
                            self.config.personas.researcher.prompt(),
                            prompt,
                        ))
                        .await?;

                    serde_json::from_str::<Report>(strip_code_fence(&text)).map_err(|e| {
                        PipelineError::Generation(format!(
                            "undecodable report for topic '{}': {e}",
                            topic.topic
                        ))
                    })
                }
            })
            .await?;

        info!(reports = topic_reports.len(), "Research complete");
        Ok(StageOutcome::new(BindingValue::Research(ResearchResult {
            topic_reports,
        })))
    }
}

/// Synthesize the deck from the request and research reports
struct SynthesizeStage {
    request: Arc<DeckRequest>,
    config: Arc<DeckConfig>,
    completion: Arc<dyn CompletionClient>,
}

#[async_trait]
impl Stage for SynthesizeStage {
    fn name(&self) -> &str {
        "synthesize"
    }

    fn inputs(&self) -> &[&str] {
        &["research"]
    }

    fn output(&self) -> &str {
        "deck"
    }

    fn checkpoint_file(&self) -> Option<String> {
        Some(self.request.raw_output_file())
    }

    fn restore(&self, content: &str) -> Result<BindingValue, PipelineError> {
        Ok(BindingValue::Deck(SlideDeck::parse(content)))
    }

    async fn run(&self, bindings: &Bindings) -> Result<StageOutcome, PipelineError> {
        let research = bindings.research("research")?;

        let reports_block: String = research
            .topic_reports
            .iter()
            .map(|r| {
                format!(
                    "## {}\n{}\nLinks:\n{}",
                    r.topic,
                    r.content,
                    r.links.join("\n")
                )
            })
            .collect::<Vec<_>>()
            .join("\n\n");

        let images_block = if self.request.images.is_empty() {
            String::new()
        } else {
            let lines: Vec<String> = self
                .request
                .images
                .iter()
                .map(|(name, info)| format!("- {name}: {} (use when: {})", info.url, info.use_when))
                .collect();
            format!("Available images:\n{}\n\n", lines.join("\n"))
        };

        let prompt = format!(
            "Create a slide deck in Marp markdown with about {count} slides, \
             separating slides with a line containing only ---.\n\
             Brief: {brief}\n\
             About the presenter: {bio}\n\n\
             {images}Research reports:\n{reports}\n\n\
             Where an architecture or flow diagram would help, include a fenced \
             ```dot code block containing Graphviz digraph source.\n\
             Return only the deck markdown.",
            count = self.request.slide_count,
            brief = self.request.brief,
            bio = self.request.presenter_bio,
            images = images_block,
            reports = reports_block,
        );

        let text = self
            .completion
            .complete(CompletionRequest::new(
                self.config.personas.creator.prompt(),
                prompt,
            ))
            .await?;

        let deck = SlideDeck::parse(&text);
        if deck.is_empty() {
            return Err(PipelineError::Generation(
                "creator returned an empty deck".to_string(),
            ));
        }

        let deck = if deck.header().is_none() && !self.request.header.trim().is_empty() {
            deck.with_header(&self.request.header)
        } else {
            deck
        };

        info!(slides = deck.slides().len(), "Deck synthesized");
        Ok(StageOutcome::new(BindingValue::Deck(deck)))
    }
}

/// Expand directive blocks into rendered diagram references
struct ExpandStage {
    request: Arc<DeckRequest>,
    config: Arc<DeckConfig>,
    renderer: Arc<dyn DotRenderer>,
}

#[async_trait]
impl Stage for ExpandStage {
    fn name(&self) -> &str {
        "expand"
    }

    fn inputs(&self) -> &[&str] {
        &["deck"]
    }

    fn output(&self) -> &str {
        "deck"
    }

    fn checkpoint_file(&self) -> Option<String> {
        Some(self.request.with_diagrams_output_file())
    }

    fn restore(&self, content: &str) -> Result<BindingValue, PipelineError> {
        Ok(BindingValue::Deck(SlideDeck::parse(content)))
    }

    async fn run(&self, bindings: &Bindings) -> Result<StageOutcome, PipelineError> {
        let deck = bindings.deck("deck")?;
        let output_dir = PathBuf::from(&self.request.output_directory);
        tokio::fs::create_dir_all(&output_dir).await?;

        let (expanded, warnings) = expand_deck(
            deck,
            self.renderer.as_ref(),
            &output_dir,
            self.config.concurrency_level,
        )
        .await?;

        if !warnings.is_empty() {
            info!(
                failed_blocks = warnings.len(),
                "Some diagram blocks were left unexpanded"
            );
        }
        Ok(StageOutcome::with_warnings(
            BindingValue::Deck(expanded),
            warnings,
        ))
    }
}

/// Optionally enrich slides with illustrations, then persist the final deck
struct IllustrateStage {
    request: Arc<DeckRequest>,
    config: Arc<DeckConfig>,
    completion: Arc<dyn CompletionClient>,
    store: CheckpointStore,
}

#[async_trait]
impl Stage for IllustrateStage {
    fn name(&self) -> &str {
        "illustrate"
    }

    fn inputs(&self) -> &[&str] {
        &["deck"]
    }

    fn output(&self) -> &str {
        "deck"
    }

    async fn run(&self, bindings: &Bindings) -> Result<StageOutcome, PipelineError> {
        let deck = bindings.deck("deck")?;

        let final_deck = if !self.request.auto_illustrate {
            info!("Not auto illustrating");
            deck.clone()
        } else {
            info!("Adding illustrations per slide");
            let slides = deck.slides().to_vec();
            let rewritten =
                fanout::map(slides, self.config.concurrency_level, |_, slide| async move {
                    let prompt = format!(
                        "Take the following slide in Marp format. The content is inside \
                         <slide> tags.\n\
                         Overall objective: {brief}\n\n\
                         If the slide contains an important point, try to add an image to \
                         it. Do not do this for every slide, only where it may make an \
                         impact. Check that the image is available. Keep the image small \
                         and put it on the right. Make no other changes.\n\
                         If no image is needed, return the slide unchanged.\n\
                         Return nothing but the amended slide content, without the \
                         <slide> tags.\n\n\
                         <slide>\n{content}\n</slide>",
                        brief = self.request.brief,
                        content = slide.content,
                    );

                    let text = self
                        .completion
                        .complete(
                            CompletionRequest::new(
                                self.config.personas.illustrator.prompt(),
                                prompt,
                            )
                            .with_temperature(0.3),
                        )
                        .await?;

                    Ok((slide.number, text))
                })
                .await?;

            let mut updated = deck.clone();
            for (number, content) in rewritten {
                updated = updated.replace_slide(number, &content)?;
            }
            updated
        };

        info!(
            directory = %self.request.output_directory,
            file = %self.request.output_file,
            "Saving final deck markdown"
        );
        self.store
            .save(&self.request.output_file, &final_deck.serialize())
            .await?;

        Ok(StageOutcome::new(BindingValue::Deck(final_deck)))
    }
}

/// Convert the persisted final deck into the delivery format
struct FormatStage {
    request: Arc<DeckRequest>,
    formatter: Arc<dyn SlideFormatter>,
}

#[async_trait]
impl Stage for FormatStage {
    fn name(&self) -> &str {
        "format"
    }

    fn inputs(&self) -> &[&str] {
        &["deck"]
    }

    fn output(&self) -> &str {
        "artifact"
    }

    async fn run(&self, bindings: &Bindings) -> Result<StageOutcome, PipelineError> {
        // The deck binding sequences this stage after illustrate, which
        // persisted the markdown the formatter reads.
        bindings.deck("deck")?;

        let html = self
            .formatter
            .to_html(
                Path::new(&self.request.output_directory),
                &self.request.output_file,
            )
            .await?;

        info!(artifact = %html.display(), "Deck formatted");
        Ok(StageOutcome::new(BindingValue::Artifact(html)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("plain"), "plain");
        assert_eq!(strip_code_fence("```json\n[1, 2]\n```"), "[1, 2]");
        assert_eq!(strip_code_fence("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  [3]  "), "[3]");
    }

    #[test]
    fn test_pipeline_construction() {
        use crate::adapters::{DotCli, MarpCli};
        use std::time::Duration;

        struct NoCompletion;

        #[async_trait]
        impl CompletionClient for NoCompletion {
            async fn complete(&self, _request: CompletionRequest) -> Result<String, PipelineError> {
                Err(PipelineError::Generation("not wired".to_string()))
            }
        }

        let request = Arc::new(DeckRequest {
            brief: "brief".to_string(),
            presenter_bio: "bio".to_string(),
            slide_count: 5,
            references: Vec::new(),
            output_directory: "./out".to_string(),
            output_file: "deck.md".to_string(),
            header: String::new(),
            images: Default::default(),
            auto_illustrate: false,
            research_report_max_words: 300,
        });

        let pipeline = deck_pipeline(
            Arc::clone(&request),
            Arc::new(DeckConfig::default()),
            Arc::new(NoCompletion),
            Arc::new(DotCli::new("dot", Duration::from_secs(5))),
            Arc::new(MarpCli::new("marp", Duration::from_secs(5))),
            CheckpointStore::new("./out"),
        )
        .unwrap();

        let names: Vec<&str> = pipeline.stages().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec!["plan", "research", "synthesize", "expand", "illustrate", "format"]
        );
        assert_eq!(pipeline.final_output(), "artifact");
    }
}
