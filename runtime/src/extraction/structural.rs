//! Card extraction driven by the site profile's selectors.

use scraper::{ElementRef, Html, Selector};
use shelfcrawl::RawCard;

use super::{compile, element_text, first_attr, ExtractionError, SelectorStrategy};
use crate::config::SiteProfile;

const IMAGE_ATTRS: &[&str] = &["src", "data-src", "data-lazy-src"];

pub struct StructuralStrategy {
    card: Selector,
    name: Selector,
    price: Selector,
    image: Selector,
    link: Selector,
    any_link: Selector,
}

impl StructuralStrategy {
    pub fn new(profile: &SiteProfile) -> Result<Self, ExtractionError> {
        Ok(Self {
            card: compile(&profile.card_selector)?,
            name: compile(&profile.name_selector)?,
            price: compile(&profile.price_selector)?,
            image: compile(&profile.image_selector)?,
            link: compile(&profile.link_selector)?,
            any_link: compile("a[href]")?,
        })
    }

    fn card(&self, element: ElementRef<'_>) -> RawCard {
        let name = element.select(&self.name).next().map(element_text);
        let price_text = element.select(&self.price).next().map(element_text);
        let image = element
            .select(&self.image)
            .next()
            .and_then(|img| first_attr(img, IMAGE_ATTRS));
        let link = element
            .select(&self.link)
            .next()
            .or_else(|| element.select(&self.any_link).next())
            .and_then(|a| first_attr(a, &["href"]));

        RawCard {
            name,
            price_text,
            image,
            link,
        }
    }
}

impl SelectorStrategy for StructuralStrategy {
    fn name(&self) -> &'static str {
        "structural"
    }

    fn extract(&self, document: &Html) -> Vec<RawCard> {
        document
            .select(&self.card)
            .map(|element| self.card(element))
            .collect()
    }
}
