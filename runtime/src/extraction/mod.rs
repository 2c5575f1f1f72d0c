//! Product card extraction from rendered listing HTML.
//!
//! Strategies are tried in rank order; the first one that finds any card wins.
//! A strategy that finds nothing returns an empty list instead of failing so
//! the next one gets its turn.

pub mod link_heuristic;
pub mod structural;

use scraper::{ElementRef, Html, Selector};
use shelfcrawl::{collapse_whitespace, RawCard};

use crate::config::SiteProfile;

pub use link_heuristic::LinkHeuristicStrategy;
pub use structural::StructuralStrategy;

#[derive(thiserror::Error, Debug)]
pub enum ExtractionError {
    #[error("invalid selector {selector:?}: {reason}")]
    InvalidSelector { selector: String, reason: String },
    #[error("invalid pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// One way of locating product cards in a document.
pub trait SelectorStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, document: &Html) -> Vec<RawCard>;
}

/// Ranked fallback chain of strategies.
pub struct StrategyChain {
    strategies: Vec<Box<dyn SelectorStrategy>>,
}

impl StrategyChain {
    pub fn new(strategies: Vec<Box<dyn SelectorStrategy>>) -> Self {
        Self { strategies }
    }

    /// Structural match on the profile's selectors, then the link heuristic.
    pub fn for_profile(profile: &SiteProfile) -> Result<Self, ExtractionError> {
        Ok(Self::new(vec![
            Box::new(StructuralStrategy::new(profile)?),
            Box::new(LinkHeuristicStrategy::new(&profile.currency_marker)?),
        ]))
    }

    /// Cards from the first strategy that finds any, with that strategy's name.
    pub fn extract(&self, html: &str) -> (Vec<RawCard>, Option<&'static str>) {
        let document = Html::parse_document(html);
        for strategy in &self.strategies {
            let cards = strategy.extract(&document);
            if !cards.is_empty() {
                return (cards, Some(strategy.name()));
            }
            tracing::debug!("Strategy {} found no cards", strategy.name());
        }
        (Vec::new(), None)
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}

pub(crate) fn compile(selector: &str) -> Result<Selector, ExtractionError> {
    Selector::parse(selector).map_err(|e| ExtractionError::InvalidSelector {
        selector: selector.to_string(),
        reason: e.to_string(),
    })
}

pub(crate) fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// First non-empty attribute among `names`.
pub(crate) fn first_attr(element: ElementRef<'_>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|n| element.value().attr(n))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(String::from)
}
