//! The slide deck document model.
//!
//! A deck is an ordered sequence of slides in Marp markdown. Slides carry a
//! stable number assigned at parse time; numbers are unique within a deck and
//! never reassigned. Decks are persistent values: replacement returns a new
//! deck and leaves the original untouched.

use serde::{Deserialize, Serialize};

use crate::core::error::PipelineError;

/// One slide: a stable identity and its markdown content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slide {
    /// Identity within the deck, assigned at parse, 1-based
    pub number: u32,

    /// Markdown content, without the slide separator
    pub content: String,
}

/// An ordered slide deck with optional Marp front matter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideDeck {
    header: Option<String>,
    slides: Vec<Slide>,
}

impl SlideDeck {
    /// Parse Marp markdown into a deck.
    ///
    /// A leading `---` fence pair is treated as front matter; every other
    /// line consisting of exactly `---` separates slides. Whitespace at
    /// slide boundaries is normalized; slide content is otherwise untouched.
    pub fn parse(text: &str) -> Self {
        let (header, body) = split_front_matter(text);

        let mut slides = Vec::new();
        let mut current = Vec::new();
        for line in body.lines() {
            if line.trim_end() == "---" {
                push_slide(&mut slides, &mut current);
            } else {
                current.push(line);
            }
        }
        push_slide(&mut slides, &mut current);

        Self { header, slides }
    }

    /// Read-only view of the slides, in number order
    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    /// The front matter, if any
    pub fn header(&self) -> Option<&str> {
        self.header.as_deref()
    }

    /// Return a copy of this deck carrying the given front matter
    pub fn with_header(&self, header: &str) -> Self {
        let mut deck = self.clone();
        if !header.trim().is_empty() {
            deck.header = Some(header.trim().to_string());
        }
        deck
    }

    /// Return a new deck with the slide matching `number` replaced.
    ///
    /// Every other slide, and slide order, is unchanged. The original deck
    /// is not modified.
    pub fn replace_slide(&self, number: u32, new_content: &str) -> Result<Self, PipelineError> {
        let mut deck = self.clone();
        let slide = deck
            .slides
            .iter_mut()
            .find(|s| s.number == number)
            .ok_or(PipelineError::SlideNotFound(number))?;
        slide.content = new_content.trim().to_string();
        Ok(deck)
    }

    /// Deterministic serialized form: front matter, then slides joined by
    /// the Marp separator, in number order.
    pub fn serialize(&self) -> String {
        let mut parts = Vec::with_capacity(self.slides.len() + 1);
        if let Some(header) = &self.header {
            parts.push(format!("---\n{header}\n---"));
        }
        for slide in &self.slides {
            parts.push(slide.content.clone());
        }
        let mut out = parts.join("\n\n---\n\n");
        out.push('\n');
        out
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }
}

fn push_slide(slides: &mut Vec<Slide>, current: &mut Vec<&str>) {
    let content = current.join("\n").trim().to_string();
    current.clear();
    if !content.is_empty() {
        slides.push(Slide {
            number: slides.len() as u32 + 1,
            content,
        });
    }
}

/// Split a leading front-matter fence pair off the document, if present
fn split_front_matter(text: &str) -> (Option<String>, &str) {
    let Some(rest) = text.strip_prefix("---\n") else {
        return (None, text);
    };
    // Front matter requires a closing fence; otherwise the leading --- is
    // an (empty) slide separator and the document has no header.
    match rest.find("\n---") {
        Some(end) => {
            let header = rest[..end].trim().to_string();
            let body = rest[end + 4..].strip_prefix('\n').unwrap_or(&rest[end + 4..]);
            (Some(header), body)
        }
        None => (None, text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DECK: &str = "---\nmarp: true\ntheme: default\n---\n\n# Title\n\nIntro\n\n---\n\n## Second\n\nBody\n";

    #[test]
    fn test_parse_with_front_matter() {
        let deck = SlideDeck::parse(DECK);

        assert_eq!(deck.header(), Some("marp: true\ntheme: default"));
        assert_eq!(deck.slides().len(), 2);
        assert_eq!(deck.slides()[0].number, 1);
        assert!(deck.slides()[0].content.starts_with("# Title"));
        assert_eq!(deck.slides()[1].number, 2);
    }

    #[test]
    fn test_parse_without_front_matter() {
        let deck = SlideDeck::parse("# Only\n\n---\n\n# Two");

        assert_eq!(deck.header(), None);
        assert_eq!(deck.slides().len(), 2);
    }

    #[test]
    fn test_serialize_roundtrip() {
        let deck = SlideDeck::parse(DECK);
        let reparsed = SlideDeck::parse(&deck.serialize());

        assert_eq!(deck, reparsed);
    }

    #[test]
    fn test_serialize_is_deterministic() {
        let deck = SlideDeck::parse(DECK);
        assert_eq!(deck.serialize(), deck.serialize());
    }

    #[test]
    fn test_replace_slide_preserves_identities() {
        let deck = SlideDeck::parse(DECK);
        let replaced = deck.replace_slide(2, "## Rewritten").unwrap();

        let numbers: Vec<u32> = replaced.slides().iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 2]);
        assert_eq!(replaced.slides()[1].content, "## Rewritten");
        // Untouched slide is unchanged, and the original deck is unaffected.
        assert_eq!(replaced.slides()[0], deck.slides()[0]);
        assert!(deck.slides()[1].content.starts_with("## Second"));
    }

    #[test]
    fn test_replace_unknown_slide() {
        let deck = SlideDeck::parse(DECK);
        assert!(matches!(
            deck.replace_slide(99, "nope"),
            Err(PipelineError::SlideNotFound(99))
        ));
    }

    #[test]
    fn test_empty_document() {
        let deck = SlideDeck::parse("");
        assert!(deck.is_empty());
    }
}
