//! Turning raw card text pulled from a page into candidate records.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::image::upgrade_image_url;
use crate::price::parse_price;
use crate::types::{Record, Task};

/// Acceptance rule for candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateMode {
    /// Name and a positive price are required.
    Strict,
    /// Name plus either a positive price or a detail link.
    #[default]
    Lenient,
}

/// Unprocessed fields of one product card as found on the page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCard {
    pub name: Option<String>,
    pub price_text: Option<String>,
    pub image: Option<String>,
    pub link: Option<String>,
}

impl RawCard {
    /// Normalise the card into a record tagged with the task's labels.
    ///
    /// Relative links and image URLs are resolved against `base`. Returns
    /// `None` when the card does not satisfy `mode`.
    pub fn into_record(
        self,
        task: &Task,
        base: Option<&Url>,
        mode: CandidateMode,
        hires_size: u32,
    ) -> Option<Record> {
        let name = collapse_whitespace(self.name.as_deref().unwrap_or_default());
        if name.is_empty() {
            return None;
        }

        let price = self.price_text.as_deref().and_then(parse_price);
        let link = self
            .link
            .as_deref()
            .map(|l| resolve(l, base))
            .unwrap_or_default();

        let acceptable = match mode {
            CandidateMode::Strict => price.is_some(),
            CandidateMode::Lenient => price.is_some() || !link.is_empty(),
        };
        if !acceptable {
            return None;
        }

        let image = self
            .image
            .as_deref()
            .map(|i| upgrade_image_url(&resolve(i, base), hires_size))
            .unwrap_or_default();

        Some(Record {
            category: task.category.clone(),
            subcategory: task.subcategory.clone(),
            name,
            price: price.unwrap_or(0.0),
            image,
            link,
        })
    }
}

fn resolve(value: &str, base: Option<&Url>) -> String {
    let value = value.trim();
    if value.is_empty() || value.starts_with("data:") || value.starts_with("javascript:") {
        return String::new();
    }
    match base.and_then(|b| b.join(value).ok()) {
        Some(url) => url.to_string(),
        None => value.to_string(),
    }
}

/// Collapse runs of whitespace (including non-breaking spaces) to one space.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
