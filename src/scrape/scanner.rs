// scanner.rs
use chrono::{DateTime, Utc};
use scraper::Html;
use std::collections::HashSet;
use tracing::{info, warn};
use url::Url;

use crate::db::DedupStore;
use crate::domain::Listing;
use crate::errors::{url_prefix, FetchError, ScanError};
use crate::scrape::card::ListingExtractor;
use crate::scrape::http::{fetch_page, HttpSource};
use crate::scrape::markup::Markup;

/// Finds listings on the results page that were never ingested before and
/// marks them as ingested.
pub struct ListingScanner<'a> {
    http: &'a dyn HttpSource,
    store: &'a dyn DedupStore,
    markup: &'a Markup,
    extractor: ListingExtractor<'a>,
}

impl<'a> ListingScanner<'a> {
    pub fn new(
        http: &'a dyn HttpSource,
        store: &'a dyn DedupStore,
        markup: &'a Markup,
        extractor: ListingExtractor<'a>,
    ) -> Self {
        Self {
            http,
            store,
            markup,
            extractor,
        }
    }

    /// Returns new listings in page order. Their dedup markers are written
    /// before this returns, so later failures never cause a re-notification.
    /// If the markers can't be written nothing is returned.
    pub fn scan(&self, url: &str, now: DateTime<Utc>) -> Result<Vec<Listing>, ScanError> {
        let base = Url::parse(url).map_err(|e| FetchError::transport(url, e))?;
        let html = fetch_page(self.http, url)?;
        let candidates = self.extract_cards(&html, &base, now)?;

        if candidates.is_empty() {
            info!("no listings were parsed in this iteration");
            return Ok(candidates);
        }

        let ids: HashSet<_> = candidates.iter().map(|l| l.external_id).collect();
        let seen = self.store.has_seen(&ids)?;

        let mut emitted = HashSet::new();
        let fresh: Vec<Listing> = candidates
            .into_iter()
            .filter(|l| {
                if seen.contains(&l.external_id) {
                    info!(external_id = l.external_id, "already parsed, skipping");
                    return false;
                }
                // promoted cards can repeat a listing further down the page
                emitted.insert(l.external_id)
            })
            .collect();

        // no marker, no notification: a failed write aborts the scan
        let markers: Vec<_> = fresh.iter().map(|l| (l.external_id, l.scanned_at)).collect();
        self.store.record_batch(&markers)?;

        info!(new = fresh.len(), already_seen = seen.len(), "scan finished");
        Ok(fresh)
    }

    fn extract_cards(&self, html: &str, base: &Url, now: DateTime<Utc>) -> Result<Vec<Listing>, ScanError> {
        let doc = Html::parse_document(html);
        let results = self.markup.results_page.require(doc.root_element())?;

        let mut listings = Vec::new();
        for (idx, card) in self.markup.offer_card.all(results).into_iter().enumerate() {
            match self.extractor.extract(card, base, now) {
                Ok(listing) => listings.push(listing),
                Err(e) => warn!(card = idx, page = url_prefix(base.as_str()), error = %e, "skipping unparseable card"),
            }
        }
        Ok(listings)
    }
}
