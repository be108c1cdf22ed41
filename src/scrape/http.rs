// http.rs
use rand::seq::SliceRandom;
use reqwest::blocking::Client;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info};

use crate::errors::{url_prefix, FetchError};

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.1 Safari/605.1.15",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:122.0) Gecko/20100101 Firefox/122.0",
];

/// Status plus a streaming body. Nothing is buffered until the caller reads.
pub struct HttpResponse {
    pub status: u16,
    pub body: Box<dyn Read>,
}

/// GET access to the source site, for both pages and images.
pub trait HttpSource {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError>;
}

pub struct BlockingHttp {
    client: Client,
}

impl BlockingHttp {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        let user_agent = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);
        info!(user_agent, "picked user agent");

        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| FetchError::transport("<client>", e))?;

        Ok(Self { client })
    }
}

impl HttpSource for BlockingHttp {
    fn get(&self, url: &str) -> Result<HttpResponse, FetchError> {
        debug!(url = url_prefix(url), "GET");
        let resp = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::transport(url, e))?;

        Ok(HttpResponse {
            status: resp.status().as_u16(),
            body: Box::new(resp),
        })
    }
}

/// Fetches a page and returns its body; anything but 200 is an error.
pub fn fetch_page(http: &dyn HttpSource, url: &str) -> Result<String, FetchError> {
    info!(url = url_prefix(url), "loading page");
    let mut resp = http.get(url)?;
    if resp.status != 200 {
        return Err(FetchError::status(url, resp.status));
    }

    let mut raw = Vec::new();
    resp.body
        .read_to_end(&mut raw)
        .map_err(|e| FetchError::transport(url, e))?;
    Ok(String::from_utf8_lossy(&raw).into_owned())
}
