//! Markup-agnostic fallback: a product is an image link whose nearby text
//! carries a price.

use std::collections::HashSet;

use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use shelfcrawl::RawCard;

use super::{compile, element_text, first_attr, ExtractionError, SelectorStrategy};

/// How far up from the anchor to look for the price text.
const MAX_ANCESTOR_DEPTH: usize = 6;

pub struct LinkHeuristicStrategy {
    anchor: Selector,
    image: Selector,
    currency_marker: String,
    price: Option<Regex>,
}

impl LinkHeuristicStrategy {
    pub fn new(currency_marker: &str) -> Result<Self, ExtractionError> {
        let price = if currency_marker.is_empty() {
            None
        } else {
            let pattern = format!(r"{}\s*\d[\d.,]*", regex::escape(currency_marker));
            let compiled = Regex::new(&pattern).map_err(|e| ExtractionError::InvalidPattern {
                pattern: pattern.clone(),
                reason: e.to_string(),
            })?;
            Some(compiled)
        };
        Ok(Self {
            anchor: compile("a[href]")?,
            image: compile("img")?,
            currency_marker: currency_marker.to_string(),
            price,
        })
    }

    /// First marker-prefixed amount in `text`.
    fn price_segment(&self, text: &str) -> Option<String> {
        let found = self.price.as_ref()?.find(text)?;
        Some(found.as_str().to_string())
    }

    fn card(&self, anchor: ElementRef<'_>) -> Option<RawCard> {
        let image = anchor.select(&self.image).next()?;

        let price_text = anchor
            .ancestors()
            .filter_map(ElementRef::wrap)
            .take(MAX_ANCESTOR_DEPTH)
            .map(element_text)
            .find_map(|text| self.price_segment(&text))?;

        let name = Some(element_text(anchor))
            .filter(|t| !t.is_empty() && !t.contains(&self.currency_marker))
            .or_else(|| first_attr(image, &["alt"]))
            .or_else(|| first_attr(anchor, &["title", "aria-label"]));

        Some(RawCard {
            name,
            price_text: Some(price_text),
            image: first_attr(image, &["src", "data-src"]),
            link: first_attr(anchor, &["href"]),
        })
    }
}

impl SelectorStrategy for LinkHeuristicStrategy {
    fn name(&self) -> &'static str {
        "link-heuristic"
    }

    fn extract(&self, document: &Html) -> Vec<RawCard> {
        let mut seen = HashSet::new();
        document
            .select(&self.anchor)
            .filter_map(|anchor| self.card(anchor))
            .filter(|card| card.link.as_ref().is_some_and(|l| seen.insert(l.clone())))
            .collect()
    }
}
