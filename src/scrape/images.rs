use std::fs::{self, File};
use std::io;
use std::path::Path;
use tracing::{debug, info};

use crate::errors::{url_prefix, FetchError};
use crate::scrape::http::HttpSource;

pub struct ImageFetcher<'a> {
    http: &'a dyn HttpSource,
}

impl<'a> ImageFetcher<'a> {
    pub fn new(http: &'a dyn HttpSource) -> Self {
        Self { http }
    }

    /// Streams `source_url` into `destination`, creating parent directories.
    ///
    /// Returns `Ok(false)` without touching the disk when the server answers
    /// anything but 200. An existing file at `destination` is overwritten.
    pub fn download(&self, source_url: &str, destination: &Path) -> Result<bool, FetchError> {
        info!(url = url_prefix(source_url), "downloading image");
        let mut resp = self.http.get(source_url)?;
        if resp.status != 200 {
            debug!(status = resp.status, url = url_prefix(source_url), "image not downloaded");
            return Ok(false);
        }

        let io_err = |source: io::Error| FetchError::Io {
            path: destination.display().to_string(),
            source,
        };

        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut file = File::create(destination).map_err(io_err)?;
        if let Err(e) = io::copy(&mut resp.body, &mut file) {
            drop(file);
            // never leave a truncated image behind
            let _ = fs::remove_file(destination);
            return Err(FetchError::transport(source_url, e));
        }

        Ok(true)
    }
}
