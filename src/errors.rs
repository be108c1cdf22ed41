// errors.rs
use thiserror::Error;

/// Longest URL prefix quoted in errors and logs.
const URL_PREFIX_LEN: usize = 100;

/// Truncates a URL for logging without splitting a UTF-8 character.
pub fn url_prefix(url: &str) -> &str {
    match url.char_indices().nth(URL_PREFIX_LEN) {
        Some((idx, _)) => &url[..idx],
        None => url,
    }
}

/// Failure to get a page or image from the source site.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("no {section} block on {url}")]
    MissingSection { url: String, section: &'static str },

    #[error("writing {path} failed: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    pub fn transport(url: &str, message: impl ToString) -> Self {
        FetchError::Transport {
            url: url_prefix(url).to_string(),
            message: message.to_string(),
        }
    }

    pub fn status(url: &str, status: u16) -> Self {
        FetchError::Status {
            url: url_prefix(url).to_string(),
            status,
        }
    }
}

/// A structural element the extractor depends on is not in the markup.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("required element `{0}` not found")]
    Missing(&'static str),

    #[error("link has no numeric listing id: {0}")]
    InvalidId(String),

    #[error("expected at least {expected} info sections, found {found}")]
    TooFewSections { found: usize, expected: usize },

    #[error("bad selector `{css}`: {message}")]
    Selector { css: &'static str, message: String },
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template references unknown field `{0}`")]
    UnknownField(String),

    #[error("unbalanced brace at byte {0}")]
    Unbalanced(usize),

    #[error("cannot read template {path}: {source}")]
    Load {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("open database {path} failed: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),
}

/// Anything that aborts a whole scan (and therefore the tick).
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("channel request failed: {0}")]
    Transport(String),

    #[error("{method} rejected: {description}")]
    Api { method: &'static str, description: String },

    #[error("cannot read photo {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<reqwest::Error> for DispatchError {
    fn from(e: reqwest::Error) -> Self {
        // reqwest errors can embed the bot token in the URL
        DispatchError::Transport(e.without_url().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_prefix_truncates_on_char_boundary() {
        let long = format!("https://example.com/{}", "ж".repeat(200));
        let cut = url_prefix(&long);
        assert_eq!(cut.chars().count(), 100);
        assert!(long.starts_with(cut));
        assert_eq!(url_prefix("https://short"), "https://short");
    }
}
