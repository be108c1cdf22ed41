use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};

use crate::domain::{ExternalId, Listing};
use crate::notify::template::MessageTemplate;
use crate::notify::telegram::MessageChannel;
use crate::scrape::listing_photo_dir;

/// Per-recipient outcome of one dispatch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub texts_sent: usize,
    pub groups_sent: usize,
    pub failures: usize,
}

impl DispatchReport {
    pub fn fully_delivered(&self) -> bool {
        self.failures == 0
    }
}

pub struct NotificationDispatcher<'a> {
    channel: &'a dyn MessageChannel,
    recipients: &'a [String],
    image_root: &'a Path,
}

impl<'a> NotificationDispatcher<'a> {
    pub fn new(channel: &'a dyn MessageChannel, recipients: &'a [String], image_root: &'a Path) -> Self {
        Self {
            channel,
            recipients,
            image_root,
        }
    }

    /// Sends the rendered text, then the photo group, to every recipient and
    /// removes the listing's photo directory afterwards whatever happened.
    /// Channel failures are logged and counted, never retried.
    pub fn dispatch(&self, listing: &Listing, template: &MessageTemplate) -> DispatchReport {
        let text = template.render(listing);
        let mut report = DispatchReport::default();

        for recipient in self.recipients {
            match self.channel.send_text(recipient, &text) {
                Ok(()) => report.texts_sent += 1,
                Err(e) => {
                    error!(external_id = listing.external_id, recipient = %recipient, error = %e, "text not delivered");
                    report.failures += 1;
                }
            }
        }

        if listing.photo_paths.is_empty() {
            debug!(external_id = listing.external_id, "no photos to send");
        } else {
            for recipient in self.recipients {
                match self.channel.send_photo_group(recipient, &listing.photo_paths) {
                    Ok(()) => report.groups_sent += 1,
                    Err(e) => {
                        error!(external_id = listing.external_id, recipient = %recipient, error = %e, "photos not delivered");
                        report.failures += 1;
                    }
                }
            }
        }

        self.cleanup(listing.external_id);
        report
    }

    /// Best-effort removal of `<image_root>/<external_id>`.
    pub fn cleanup(&self, id: ExternalId) {
        let dir: PathBuf = listing_photo_dir(self.image_root, id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => debug!(path = %dir.display(), "photo directory removed"),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %dir.display(), error = %e, "photo cleanup failed"),
        }
    }
}
