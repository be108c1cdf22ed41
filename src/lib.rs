//! Polls a real-estate search page, ingests each new listing exactly once
//! and posts it (text + photos) to a set of Telegram recipients.

pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod notify;
pub mod pipeline;
pub mod scrape;
pub mod telemetry;

#[cfg(test)]
mod tests;
