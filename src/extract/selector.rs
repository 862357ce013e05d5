//! Keyword-triggered page selection.
//!
//! Every match carries the same confidence, so the anchor is simply the first
//! matching span on the first matching page.

use crate::pdf::{PageRect, PageSource, PdfError};

/// Confidence given to every phrase match
pub const MATCH_CONFIDENCE: u8 = 10;

/// A span containing one of the target phrases.
#[derive(Debug, Clone, PartialEq)]
pub struct KeywordMatch {
    pub page: usize,
    /// Trimmed span text
    pub text: String,
    pub rect: PageRect,
    pub confidence: u8,
}

/// Case-insensitive substring matcher over a fixed phrase list.
#[derive(Debug, Clone)]
pub struct KeywordSelector {
    phrases: Vec<String>,
}

impl KeywordSelector {
    pub fn new<S: AsRef<str>>(phrases: &[S]) -> Self {
        Self {
            phrases: phrases
                .iter()
                .map(|p| p.as_ref().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.phrases.iter().any(|p| lower.contains(p.as_str()))
    }

    /// All matching spans on one page, in span order.
    pub fn page_matches<S: PageSource + ?Sized>(
        &self,
        source: &S,
        page: usize,
    ) -> Result<Vec<KeywordMatch>, PdfError> {
        Ok(source
            .text_spans(page)?
            .into_iter()
            .filter_map(|span| {
                let text = span.text.trim();
                self.matches(text).then(|| KeywordMatch {
                    page,
                    text: text.to_string(),
                    rect: span.rect,
                    confidence: MATCH_CONFIDENCE,
                })
            })
            .collect())
    }

    /// Pick the anchor among one page's matches: first encountered wins.
    pub fn anchor(matches: Vec<KeywordMatch>) -> Option<KeywordMatch> {
        matches.into_iter().next()
    }

    /// Whether the page's full text mentions any phrase.
    pub fn page_mentions<S: PageSource + ?Sized>(
        &self,
        source: &S,
        page: usize,
    ) -> Result<bool, PdfError> {
        Ok(self.matches(&source.page_text(page)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::fixture::{FixtureDocument, FixturePage};

    fn selector() -> KeywordSelector {
        KeywordSelector::new(&["Average Retail Selling Price", "Avg. Retail Selling Price"])
    }

    #[test]
    fn matching_is_case_insensitive_substring() {
        let s = selector();
        assert!(s.matches("Figure 4: AVERAGE RETAIL SELLING PRICE (USD)"));
        assert!(s.matches("avg. retail selling price"));
        assert!(!s.matches("Average Retail Price"));
        assert!(!KeywordSelector::new(&[""]).matches("anything"));
    }

    /// First page with a match, and its anchor.
    fn first_anchor(doc: &FixtureDocument) -> Option<KeywordMatch> {
        (0..doc.page_count()).find_map(|page| {
            KeywordSelector::anchor(selector().page_matches(doc, page).expect("text access"))
        })
    }

    #[test]
    fn anchor_is_on_first_matching_page() {
        let doc = FixtureDocument::new(
            "report",
            vec![
                FixturePage::text(&[("Contents", 50.0)]),
                FixturePage::text(&[("Market overview", 60.0), ("Used truck volume", 90.0)]),
                FixturePage::text(&[
                    ("Intro", 40.0),
                    ("  Average Retail Selling Price  ", 120.0),
                    ("Avg. Retail Selling Price by model", 400.0),
                ]),
                FixturePage::text(&[("Average Retail Selling Price", 70.0)]),
            ],
        );

        let anchor = first_anchor(&doc).expect("anchor found");
        assert_eq!(anchor.page, 2);
        assert_eq!(anchor.text, "Average Retail Selling Price");
        assert_eq!(anchor.rect.y0, 120.0);
        assert_eq!(anchor.confidence, MATCH_CONFIDENCE);
    }

    #[test]
    fn page_matches_keep_span_order() {
        let doc = FixtureDocument::new(
            "report",
            vec![FixturePage::text(&[
                ("avg. retail selling price", 200.0),
                ("nothing", 70.0),
                ("Average Retail Selling Price (USD)", 90.0),
            ])],
        );
        let matches = selector().page_matches(&doc, 0).expect("text access");
        let texts: Vec<&str> = matches.iter().map(|m| m.text.as_str()).collect();
        assert_eq!(
            texts,
            vec!["avg. retail selling price", "Average Retail Selling Price (USD)"]
        );
        assert_eq!(KeywordSelector::anchor(matches).map(|a| a.rect.y0), Some(200.0));
    }

    #[test]
    fn no_match_anywhere() {
        let doc = FixtureDocument::new(
            "report",
            vec![FixturePage::text(&[("Retail volume", 70.0)])],
        );
        assert!(first_anchor(&doc).is_none());
        assert!(!selector().page_mentions(&doc, 0).expect("text access"));
    }
}
