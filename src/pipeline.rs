//! One tick of the ingestion pipeline: scan, then enrich and notify each new
//! listing in page order. Scheduling lives outside; `run_once` never loops.

use chrono::{DateTime, FixedOffset, Utc};
use std::time::Duration;
use tracing::{debug, error, info, info_span, warn};

use crate::config::AppConfig;
use crate::db::DedupStore;
use crate::errors::{url_prefix, ExtractionError};
use crate::notify::{MessageChannel, MessageTemplate, NotificationDispatcher};
use crate::scrape::{DetailEnricher, EnrichSettings, HttpSource, ListingExtractor, ListingScanner, Markup};

/// Pauses that keep us below the source site's anti-scraping radar.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Pacing {
    pub after_listing: Duration,
    pub after_tick: Duration,
}

impl Pacing {
    pub fn none() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub discovered: usize,
    pub enriched: usize,
    pub enrich_failed: usize,
    pub dispatched: usize,
    pub dispatch_failed: usize,
    /// Set when the tick stopped before processing listings.
    pub aborted: Option<String>,
}

impl TickReport {
    pub fn failed(&self) -> usize {
        self.enrich_failed + self.dispatch_failed
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub search_url: String,
    pub template_path: std::path::PathBuf,
    pub recipients: Vec<String>,
    pub enrich: EnrichSettings,
    pub pacing: Pacing,
    pub source_offset: FixedOffset,
}

impl PipelineSettings {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            search_url: cfg.search_url.clone(),
            template_path: cfg.template_path.clone(),
            recipients: cfg.recipients.clone(),
            enrich: EnrichSettings {
                image_root: cfg.image_root.clone(),
                max_photos: cfg.max_photos,
                photo_pause: cfg.photo_pause,
            },
            pacing: cfg.pacing,
            source_offset: cfg.source_offset,
        }
    }
}

pub struct Pipeline<'a> {
    http: &'a dyn HttpSource,
    store: &'a dyn DedupStore,
    channel: &'a dyn MessageChannel,
    markup: Markup,
    settings: PipelineSettings,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        http: &'a dyn HttpSource,
        store: &'a dyn DedupStore,
        channel: &'a dyn MessageChannel,
        settings: PipelineSettings,
    ) -> Result<Self, ExtractionError> {
        Ok(Self {
            http,
            store,
            channel,
            markup: Markup::compile()?,
            settings,
        })
    }

    /// Runs one tick to completion. Never fails: problems are logged and
    /// summarized in the report.
    pub fn run_once(&self, now: DateTime<Utc>) -> TickReport {
        let span = info_span!("tick", started_at = %now.format("%Y-%m-%d %H:%M:%S"));
        let _tick = span.enter();

        let mut report = TickReport {
            started_at: now,
            finished_at: now,
            ..TickReport::default()
        };

        // Loaded before scanning: a broken template must not burn dedup markers.
        let template = match MessageTemplate::load(&self.settings.template_path) {
            Ok(t) => t,
            Err(e) => return self.abort(report, e.to_string()),
        };

        let extractor = ListingExtractor::new(&self.markup, self.settings.source_offset);
        let scanner = ListingScanner::new(self.http, self.store, &self.markup, extractor);
        let listings = match scanner.scan(&self.settings.search_url, now) {
            Ok(listings) => listings,
            Err(e) => return self.abort(report, e.to_string()),
        };
        report.discovered = listings.len();

        let enricher = DetailEnricher::new(self.http, &self.markup, &self.settings.enrich);
        let dispatcher = NotificationDispatcher::new(
            self.channel,
            &self.settings.recipients,
            &self.settings.enrich.image_root,
        );

        for mut listing in listings {
            let span = info_span!("listing", external_id = listing.external_id);
            let _listing = span.enter();

            match enricher.enrich(&mut listing) {
                Ok(()) => {
                    report.enriched += 1;
                    debug!(
                        listing = %serde_json::to_string(&listing).unwrap_or_default(),
                        "dispatching"
                    );
                    if dispatcher.dispatch(&listing, &template).fully_delivered() {
                        report.dispatched += 1;
                    } else {
                        report.dispatch_failed += 1;
                    }
                }
                Err(e) => {
                    report.enrich_failed += 1;
                    // the dedup marker is already written: this listing is gone for good
                    error!(
                        url = url_prefix(&listing.url),
                        error = %e,
                        "enrichment failed, listing will not be notified"
                    );
                    dispatcher.cleanup(listing.external_id);
                }
            }

            pause(self.settings.pacing.after_listing);
        }

        pause(self.settings.pacing.after_tick);
        report.finished_at = Utc::now();
        info!(
            discovered = report.discovered,
            dispatched = report.dispatched,
            failed = report.failed(),
            "tick finished"
        );
        report
    }

    fn abort(&self, mut report: TickReport, reason: String) -> TickReport {
        warn!(reason = %reason, "tick aborted, next tick retries from scratch");
        report.aborted = Some(reason);
        report.finished_at = Utc::now();
        report
    }
}

fn pause(d: Duration) {
    if !d.is_zero() {
        std::thread::sleep(d);
    }
}
