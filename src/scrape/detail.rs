// detail.rs
use scraper::{ElementRef, Html};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

use crate::domain::{ExternalId, Listing};
use crate::errors::{url_prefix, FetchError};
use crate::scrape::http::{fetch_page, HttpSource};
use crate::scrape::images::ImageFetcher;
use crate::scrape::markup::{text_of, Markup};

/// Amenities worth mentioning; everything else on the features list is noise.
pub const AMENITY_ALLOW_LIST: [&str; 9] = [
    "Посудомоечная машина",
    "Кондиционер",
    "Ванна",
    "Душевая кабина",
    "Холодильник",
    "Стиральная машина",
    "Интернет",
    "Мебель на кухне",
    "Мебель в комнатах",
];

/// The first few gallery shots are usually floor plans and the facade.
const LEADING_IMAGES: usize = 4;

/// Why a listing carries no renovation status. All of these are layout
/// variants seen on real detail pages, not failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenovationAbsence {
    NoSummaryLayout,
    NoSummaryGroup,
    NoSummaryItems,
    NoValueParagraph,
}

#[derive(Debug, Clone)]
pub struct EnrichSettings {
    pub image_root: PathBuf,
    pub max_photos: usize,
    pub photo_pause: Duration,
}

/// Second pass over a listing: photos, amenities and renovation from its
/// detail page.
pub struct DetailEnricher<'a> {
    http: &'a dyn HttpSource,
    images: ImageFetcher<'a>,
    markup: &'a Markup,
    settings: &'a EnrichSettings,
}

impl<'a> DetailEnricher<'a> {
    pub fn new(http: &'a dyn HttpSource, markup: &'a Markup, settings: &'a EnrichSettings) -> Self {
        Self {
            http,
            images: ImageFetcher::new(http),
            markup,
            settings,
        }
    }

    /// Fills `photo_paths`, `amenity_tags` and `renovation_text` in place.
    ///
    /// Fails only when the page itself can't be fetched or has no gallery;
    /// amenities and renovation degrade to empty on their own.
    pub fn enrich(&self, listing: &mut Listing) -> Result<(), FetchError> {
        let html = fetch_page(self.http, &listing.url)?;
        let doc = Html::parse_document(&html);
        let root = doc.root_element();

        let sources = self.gallery_sources(root, &listing.url)?;
        listing.photo_paths = self.download_photos(listing.external_id, &sources);

        listing.amenity_tags = self.amenities(root);

        listing.renovation_text = match renovation_status(self.markup, root) {
            Ok(status) => Some(status),
            Err(absence) => {
                debug!(external_id = listing.external_id, ?absence, "no renovation status");
                None
            }
        };

        info!(
            external_id = listing.external_id,
            photos = listing.photo_paths.len(),
            amenities = listing.amenity_tags.len(),
            "listing enriched"
        );
        Ok(())
    }

    fn gallery_sources(&self, root: ElementRef<'_>, page_url: &str) -> Result<Vec<String>, FetchError> {
        let gallery = self
            .markup
            .gallery
            .require(root)
            .map_err(|_| FetchError::MissingSection {
                url: url_prefix(page_url).to_string(),
                section: self.markup.gallery.name,
            })?;

        let base = Url::parse(page_url).ok();
        Ok(self
            .markup
            .img
            .all(gallery)
            .into_iter()
            .filter_map(|img| img.value().attr("src"))
            .filter_map(|src| match &base {
                Some(base) => base.join(src).ok().map(String::from),
                None => Some(src.to_string()),
            })
            .collect())
    }

    fn download_photos(&self, id: ExternalId, sources: &[String]) -> Vec<String> {
        let dir = listing_photo_dir(&self.settings.image_root, id);
        let mut saved = Vec::new();

        for (idx, src) in photo_window(sources, self.settings.max_photos).iter().enumerate() {
            let dest = dir.join(photo_file_name(idx, src));
            match self.images.download(src, &dest) {
                Ok(true) => saved.push(dest.display().to_string()),
                Ok(false) => {}
                Err(e) => warn!(external_id = id, error = %e, "image dropped"),
            }
            if !self.settings.photo_pause.is_zero() {
                std::thread::sleep(self.settings.photo_pause);
            }
        }
        saved
    }

    fn amenities(&self, root: ElementRef<'_>) -> Vec<String> {
        let Some(layout) = self.markup.features_layout.find(root) else {
            return Vec::new();
        };
        let labels = self
            .markup
            .features_item
            .all(layout)
            .into_iter()
            .map(text_of);
        filter_amenities(labels)
    }
}

/// Per-listing photo directory: `<image_root>/<external_id>`.
pub fn listing_photo_dir(image_root: &Path, id: ExternalId) -> PathBuf {
    image_root.join(id.to_string())
}

/// Skips `min(len, 4) - 1` leading images, then takes up to `max`.
pub fn photo_window(sources: &[String], max: usize) -> &[String] {
    let start = sources.len().min(LEADING_IMAGES).saturating_sub(1);
    let end = start.saturating_add(max).min(sources.len());
    &sources[start..end]
}

/// Keeps allow-listed amenity labels in document order.
pub fn filter_amenities<I, S>(labels: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    labels
        .into_iter()
        .map(|l| l.as_ref().trim().to_string())
        .filter(|l| AMENITY_ALLOW_LIST.contains(&l.as_str()))
        .collect()
}

/// Last summary item's last paragraph, e.g. "Дизайнерский".
pub fn renovation_status(markup: &Markup, root: ElementRef<'_>) -> Result<String, RenovationAbsence> {
    let layout = markup
        .summary_layout
        .find(root)
        .ok_or(RenovationAbsence::NoSummaryLayout)?;
    let group = markup
        .summary_group
        .find(layout)
        .ok_or(RenovationAbsence::NoSummaryGroup)?;
    let item = markup
        .summary_item
        .last(group)
        .ok_or(RenovationAbsence::NoSummaryItems)?;
    let value = markup
        .paragraph
        .last(item)
        .ok_or(RenovationAbsence::NoValueParagraph)?;
    Ok(text_of(value))
}

/// Index-prefixed so two sources with the same basename can't collide.
fn photo_file_name(idx: usize, src: &str) -> String {
    let basename = Url::parse(src)
        .ok()
        .and_then(|u| {
            u.path_segments()
                .and_then(|s| s.filter(|p| !p.is_empty()).last().map(String::from))
        })
        .unwrap_or_else(|| "photo.jpg".to_string());
    format!("{idx:02}_{basename}")
}
