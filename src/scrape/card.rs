// card.rs
use chrono::{DateTime, FixedOffset, Utc};
use scraper::ElementRef;
use tracing::debug;
use url::Url;

use crate::domain::dates::resolve_relative_date;
use crate::domain::{ExternalId, Listing};
use crate::errors::ExtractionError;
use crate::scrape::markup::{text_of, Markup};

/// Cards normally carry this many info sections; a sixth one is a promo block.
const NOMINAL_SECTIONS: usize = 5;
/// Summary, geo and money are the ones we map.
const MAPPED_SECTIONS: usize = 3;
/// Leading geo labels repeat city/district boilerplate.
const GEO_LABELS_SKIPPED: usize = 4;

/// Turns a results-page card into a `Listing` (card fields only).
pub struct ListingExtractor<'m> {
    markup: &'m Markup,
    source_offset: FixedOffset,
}

impl<'m> ListingExtractor<'m> {
    pub fn new(markup: &'m Markup, source_offset: FixedOffset) -> Self {
        Self {
            markup,
            source_offset,
        }
    }

    /// `base` resolves relative links, `now` stamps `scanned_at` and anchors
    /// "вчера"/"сегодня" in the source site's local date.
    pub fn extract(
        &self,
        card: ElementRef<'_>,
        base: &Url,
        now: DateTime<Utc>,
    ) -> Result<Listing, ExtractionError> {
        let link_area = self.markup.link_area.require(card)?;
        let href = self
            .markup
            .anchor
            .require(link_area)?
            .value()
            .attr("href")
            .ok_or(ExtractionError::Missing("link href"))?;
        let url = base
            .join(href)
            .map_err(|_| ExtractionError::InvalidId(href.to_string()))?;
        let external_id = listing_id_from_url(&url)?;

        let mut sections = self.markup.info_section.all(link_area);
        if sections.len() > NOMINAL_SECTIONS {
            sections.remove(1);
        }
        if sections.len() < MAPPED_SECTIONS {
            return Err(ExtractionError::TooFewSections {
                found: sections.len(),
                expected: MAPPED_SECTIONS,
            });
        }

        let mut listing = Listing::new(external_id, url.as_str(), now);
        listing.summary_text = text_of(sections[0]);

        let (location, address) = self.geo(sections[1])?;
        listing.location_text = location;
        listing.address_text = address;

        let (price, note) = split_money(&text_of(sections[2]));
        listing.price_text = price;
        listing.price_note_text = note;

        listing.published_text = self.published(card, now)?;
        Ok(listing)
    }

    fn geo(&self, section: ElementRef<'_>) -> Result<(String, String), ExtractionError> {
        let Some(special) = self.markup.special_geo.first(section)? else {
            debug!("card has no transit block, leaving location empty");
            return Ok((String::new(), String::new()));
        };

        let station = self.markup.anchor.find(special).map(text_of).unwrap_or_default();
        let distance = self.markup.div.last(special).map(text_of).unwrap_or_default();
        let location = [station, distance]
            .into_iter()
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", ");

        let address = self
            .markup
            .geo_label
            .all(section)
            .into_iter()
            .skip(GEO_LABELS_SKIPPED)
            .map(text_of)
            .collect::<Vec<_>>()
            .join(", ");

        Ok((location, address))
    }

    fn published(&self, card: ElementRef<'_>, now: DateTime<Utc>) -> Result<String, ExtractionError> {
        let Some(label) = self.markup.time_label.first(card)? else {
            return Ok(String::new());
        };
        let raw = self.markup.div.last(label).map(text_of).unwrap_or_default();
        let today = now.with_timezone(&self.source_offset).date_naive();
        Ok(resolve_relative_date(&raw, today))
    }
}

/// The listing id is the trailing numeric path segment:
/// `https://www.cian.ru/rent/flat/301234567/` -> 301234567.
pub fn listing_id_from_url(url: &Url) -> Result<ExternalId, ExtractionError> {
    url.path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .filter(|s| s.bytes().all(|b| b.is_ascii_digit()))
        .and_then(|s| s.parse::<ExternalId>().ok())
        .ok_or_else(|| ExtractionError::InvalidId(url.to_string()))
}

/// Splits the money blob at its first `.`: the price comes before it, the
/// note (deposit, commission, utilities) after it.
pub fn split_money(raw: &str) -> (String, String) {
    match raw.split_once('.') {
        Some((price, note)) => (price.trim().to_string(), note.trim().to_string()),
        None => (raw.trim().to_string(), String::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tests::utils::{card_html, CardSpec};
    use chrono::TimeZone;
    use scraper::Html;

    fn moscow() -> FixedOffset {
        FixedOffset::east_opt(3 * 3600).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 9, 0, 0).unwrap()
    }

    fn base() -> Url {
        Url::parse("https://www.cian.ru/cat.php?deal_type=rent").unwrap()
    }

    fn extract(html: &str) -> Result<Listing, ExtractionError> {
        let markup = Markup::compile().unwrap();
        let doc = Html::parse_document(html);
        let card = markup.offer_card.all(doc.root_element())[0];
        ListingExtractor::new(&markup, moscow()).extract(card, &base(), now())
    }

    #[test]
    fn full_card_maps_every_field() {
        let listing = extract(&card_html(&CardSpec::new(301234567))).unwrap();

        assert_eq!(listing.external_id, 301234567);
        assert_eq!(listing.url, "https://www.cian.ru/rent/flat/301234567/");
        assert_eq!(listing.summary_text, "2-комн. кв., 54 м², 7/12 этаж");
        assert_eq!(listing.location_text, "Бауманская, 7 минут пешком");
        assert_eq!(listing.address_text, "улица Спартаковская, 19");
        assert_eq!(listing.price_text, "150 000 ₽/мес");
        assert_eq!(listing.price_note_text, "+ком. платежи, залог 150 000 ₽");
        assert_eq!(listing.published_text, "14, март, 10:00");
        assert_eq!(listing.scanned_at, now());
        assert!(listing.photo_paths.is_empty());
        assert!(listing.renovation_text.is_none());
    }

    #[test]
    fn missing_transit_block_leaves_geo_empty() {
        let spec = CardSpec {
            with_geo: false,
            ..CardSpec::new(5)
        };
        let listing = extract(&card_html(&spec)).unwrap();
        assert_eq!(listing.location_text, "");
        assert_eq!(listing.address_text, "");
        assert_eq!(listing.price_text, "150 000 ₽/мес");
    }

    #[test]
    fn promo_section_is_skipped_by_position() {
        let spec = CardSpec {
            promo: true,
            ..CardSpec::new(6)
        };
        let listing = extract(&card_html(&spec)).unwrap();
        assert_eq!(listing.summary_text, "2-комн. кв., 54 м², 7/12 этаж");
        assert_eq!(listing.location_text, "Бауманская, 7 минут пешком");
        assert_eq!(listing.price_text, "150 000 ₽/мес");
    }

    #[test]
    fn relative_link_is_resolved_against_page() {
        let spec = CardSpec {
            href: Some("/rent/flat/777/".to_string()),
            ..CardSpec::new(0)
        };
        let listing = extract(&card_html(&spec)).unwrap();
        assert_eq!(listing.external_id, 777);
        assert_eq!(listing.url, "https://www.cian.ru/rent/flat/777/");
    }

    #[test]
    fn non_numeric_link_is_an_extraction_error() {
        let spec = CardSpec {
            href: Some("https://www.cian.ru/rent/flat/promo/".to_string()),
            ..CardSpec::new(0)
        };
        let err = extract(&card_html(&spec)).unwrap_err();
        assert!(matches!(err, ExtractionError::InvalidId(_)));
    }

    #[test]
    fn card_without_link_area_is_unparseable() {
        let html = r#"<div data-testid="offer-card"><p>ad</p></div>"#;
        let err = extract(html).unwrap_err();
        assert!(matches!(err, ExtractionError::Missing("link area")));
    }

    #[test]
    fn card_with_too_few_sections_is_unparseable() {
        let html = r#"<div data-testid="offer-card"><div data-name="LinkArea">
            <a href="https://www.cian.ru/rent/flat/1/">x</a>
            <div data-name="GeneralInfoSectionRowComponent">only one</div>
        </div></div>"#;
        let err = extract(html).unwrap_err();
        assert!(matches!(err, ExtractionError::TooFewSections { found: 1, expected: 3 }));
    }

    #[test]
    fn missing_time_label_leaves_published_empty() {
        let spec = CardSpec {
            published: None,
            ..CardSpec::new(8)
        };
        assert_eq!(extract(&card_html(&spec)).unwrap().published_text, "");
    }

    #[test]
    fn money_splits_at_first_dot() {
        assert_eq!(
            split_money("150 000 ₽/мес."),
            ("150 000 ₽/мес".to_string(), String::new())
        );
        assert_eq!(
            split_money("95 000 ₽/мес.+ком. платежи"),
            ("95 000 ₽/мес".to_string(), "+ком. платежи".to_string())
        );
    }

    #[test]
    fn money_without_dot_has_empty_note() {
        assert_eq!(
            split_money("80 000 ₽"),
            ("80 000 ₽".to_string(), String::new())
        );
    }

    #[test]
    fn id_is_trailing_numeric_segment() {
        let url = Url::parse("https://www.cian.ru/rent/flat/301234567/").unwrap();
        assert_eq!(listing_id_from_url(&url).unwrap(), 301234567);
        let url = Url::parse("https://www.cian.ru/rent/flat/42?from=serp").unwrap();
        assert_eq!(listing_id_from_url(&url).unwrap(), 42);
        let url = Url::parse("https://www.cian.ru/").unwrap();
        assert!(listing_id_from_url(&url).is_err());
    }
}
