//! Directive-block expansion.
//!
//! Scans slide content for fenced ```dot blocks, renders each through the
//! external renderer, and substitutes the block (fences included) with a
//! markdown image reference. Everything outside a directive block passes
//! through untouched.
//!
//! Failures are isolated per block: a failing block stays as literal source
//! and is recorded as a warning; other blocks and other slides proceed.
//! Slides are expanded concurrently through the bounded fan-out executor;
//! blocks within a slide are expanded in document order.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::adapters::DotRenderer;
use crate::domain::{Slide, SlideDeck};

use super::error::PipelineError;
use super::fanout;

/// Opening fence of a directive block
const BLOCK_OPEN: &str = "```dot";
/// Closing fence
const BLOCK_CLOSE: &str = "```";

/// A recorded, non-fatal render failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderWarning {
    /// Slide the failing block is on
    pub slide: u32,

    /// 1-based index of the block within its slide, in document order
    pub block: usize,

    /// What the renderer reported
    pub message: String,
}

/// Expand every directive block in the deck.
///
/// Returns the rewritten deck along with warnings for blocks whose render
/// failed and which were therefore left as literal source.
pub async fn expand_deck<R>(
    deck: &SlideDeck,
    renderer: &R,
    output_dir: &Path,
    concurrency: usize,
) -> Result<(SlideDeck, Vec<RenderWarning>), PipelineError>
where
    R: DotRenderer + ?Sized,
{
    let slides: Vec<Slide> = deck.slides().to_vec();

    let expanded = fanout::map(slides, concurrency, |_, slide| async move {
        let (content, failures) = expand_slide(&slide.content, renderer, output_dir).await;
        Ok((slide.number, content, failures))
    })
    .await?;

    let mut result = deck.clone();
    let mut warnings = Vec::new();
    for (number, content, failures) in expanded {
        result = result.replace_slide(number, &content)?;
        warnings.extend(failures.into_iter().map(|(block, message)| RenderWarning {
            slide: number,
            block,
            message,
        }));
    }

    Ok((result, warnings))
}

/// Expand the blocks of a single slide, in document order.
///
/// Returns the rewritten content plus (block index, message) pairs for
/// failed renders.
async fn expand_slide<R>(
    content: &str,
    renderer: &R,
    output_dir: &Path,
) -> (String, Vec<(usize, String)>)
where
    R: DotRenderer + ?Sized,
{
    let lines: Vec<&str> = content.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut failures = Vec::new();

    let mut i = 0;
    let mut block_index = 0;
    while i < lines.len() {
        let line = lines[i];
        if line.trim() == BLOCK_OPEN {
            if let Some(close) = find_close(&lines, i + 1) {
                block_index += 1;
                let source = lines[i + 1..close].join("\n");
                match renderer.render(&source, output_dir).await {
                    Ok(path) => {
                        let file = path
                            .file_name()
                            .map(|f| f.to_string_lossy().into_owned())
                            .unwrap_or_else(|| path.display().to_string());
                        out.push(format!("![diagram]({file})"));
                    }
                    Err(e) => {
                        warn!(block = block_index, error = %e, "Diagram render failed, leaving source in place");
                        failures.push((block_index, e.to_string()));
                        for original in &lines[i..=close] {
                            out.push((*original).to_string());
                        }
                    }
                }
                i = close + 1;
                continue;
            }
            // Unclosed fence: not a directive block, pass through
        }
        out.push(line.to_string());
        i += 1;
    }

    (out.join("\n"), failures)
}

fn find_close(lines: &[&str], from: usize) -> Option<usize> {
    (from..lines.len()).find(|&j| lines[j].trim() == BLOCK_CLOSE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Renderer that fails on sources containing "fail"
    struct ScriptedRenderer {
        calls: AtomicUsize,
    }

    impl ScriptedRenderer {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl DotRenderer for ScriptedRenderer {
        async fn render(&self, source: &str, output_dir: &Path) -> Result<PathBuf, PipelineError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if source.contains("fail") {
                Err(PipelineError::Render("scripted failure".to_string()))
            } else {
                Ok(output_dir.join("diagram-0000000000000000.png"))
            }
        }
    }

    #[tokio::test]
    async fn test_no_blocks_is_identity() {
        let deck = SlideDeck::parse("# One\n\nplain text\n\n---\n\n# Two");
        let renderer = ScriptedRenderer::new();

        let (expanded, warnings) = expand_deck(&deck, &renderer, Path::new("/out"), 2)
            .await
            .unwrap();

        assert_eq!(expanded, deck);
        assert!(warnings.is_empty());
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_block_is_replaced_with_reference() {
        let deck = SlideDeck::parse("# Arch\n\n```dot\ndigraph { a -> b }\n```\n\ntail text");
        let renderer = ScriptedRenderer::new();

        let (expanded, warnings) = expand_deck(&deck, &renderer, Path::new("/out"), 2)
            .await
            .unwrap();

        let content = &expanded.slides()[0].content;
        assert!(content.contains("![diagram](diagram-0000000000000000.png)"));
        assert!(!content.contains("```dot"));
        // Surrounding content is untouched.
        assert!(content.starts_with("# Arch"));
        assert!(content.ends_with("tail text"));
        assert!(warnings.is_empty());
    }

    #[tokio::test]
    async fn test_failing_block_left_literal_and_recorded() {
        let deck = SlideDeck::parse(
            "# Mixed\n\n```dot\ndigraph fail { }\n```\n\nmiddle\n\n```dot\ndigraph ok { }\n```",
        );
        let renderer = ScriptedRenderer::new();

        let (expanded, warnings) = expand_deck(&deck, &renderer, Path::new("/out"), 2)
            .await
            .unwrap();

        let content = &expanded.slides()[0].content;
        // First block survives as literal source, second is substituted.
        assert!(content.contains("```dot\ndigraph fail { }\n```"));
        assert!(content.contains("![diagram](diagram-0000000000000000.png)"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].slide, 1);
        assert_eq!(warnings[0].block, 1);
    }

    #[tokio::test]
    async fn test_unclosed_fence_passes_through() {
        let original = "# Bad\n\n```dot\ndigraph { unterminated";
        let deck = SlideDeck::parse(original);
        let renderer = ScriptedRenderer::new();

        let (expanded, warnings) = expand_deck(&deck, &renderer, Path::new("/out"), 2)
            .await
            .unwrap();

        assert_eq!(expanded.slides()[0].content, deck.slides()[0].content);
        assert!(warnings.is_empty());
        assert_eq!(renderer.calls.load(Ordering::SeqCst), 0);
    }
}
