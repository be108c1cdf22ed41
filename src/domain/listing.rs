use chrono::{DateTime, Utc};
use serde::Serialize;

/// The source site's own numeric listing identifier.
pub type ExternalId = i64;

/// One offer from the results page, enriched from its detail page later on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Listing {
    pub external_id: ExternalId,
    pub url: String,

    // Results-page card
    pub summary_text: String,
    pub location_text: String,
    pub address_text: String,
    pub price_text: String,
    pub price_note_text: String,
    pub published_text: String,
    pub scanned_at: DateTime<Utc>,

    // Detail page (filled by enrichment)
    pub renovation_text: Option<String>,
    pub amenity_tags: Vec<String>,
    pub photo_paths: Vec<String>,
}

impl Listing {
    pub fn new(external_id: ExternalId, url: impl Into<String>, scanned_at: DateTime<Utc>) -> Self {
        Self {
            external_id,
            url: url.into(),
            summary_text: String::new(),
            location_text: String::new(),
            address_text: String::new(),
            price_text: String::new(),
            price_note_text: String::new(),
            published_text: String::new(),
            scanned_at,
            renovation_text: None,
            amenity_tags: Vec::new(),
            photo_paths: Vec::new(),
        }
    }

    /// Amenities as shown to readers: "Холодильник, Интернет".
    pub fn amenities_display(&self) -> String {
        self.amenity_tags.join(", ")
    }
}
