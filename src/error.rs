use std::fmt;

use thiserror::Error;


/// Failures that can occur while scraping and storing job postings.
///
/// Only [`ScrapeError::Setup`] is fatal to a run. Everything else is recorded
/// against the platform, link or row it happened on and the run carries on.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The browser session could not be acquired.
    #[error("failed to launch the browser session")]
    Setup(#[source] anyhow::Error),
    /// A page could not be loaded.
    #[error("failed to navigate to {url}")]
    Navigation {
        url: String,
        #[source]
        source: anyhow::Error
    },
    /// An XPath the page is expected to expose matched nothing.
    #[error("no element matches xpath {xpath}")]
    MissingElement { xpath: String },
    /// The page was loaded but its shape did not match what the scraper expected.
    #[error("unexpected page shape: {0}")]
    Extraction(String),
    /// Any other failure reported by the browser driver (opening or closing a tab, reading text).
    #[error("browser error while {action}")]
    Browser {
        action: &'static str,
        #[source]
        source: anyhow::Error
    },
    /// A row could not be written to the datasource.
    #[error("failed to write to table {table}")]
    Persistence {
        table: String,
        #[source]
        source: anyhow::Error
    }
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Setup,
    Navigation,
    Extraction,
    Browser,
    Persistence
}


impl ScrapeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Setup(_) => ErrorKind::Setup,
            Self::Navigation { .. } => ErrorKind::Navigation,
            Self::MissingElement { .. } | Self::Extraction(_) => ErrorKind::Extraction,
            Self::Browser { .. } => ErrorKind::Browser,
            Self::Persistence { .. } => ErrorKind::Persistence
        }
    }

    /// This error's message followed by the messages of everything that caused it.
    pub fn full_message(&self) -> String {
        let mut message = self.to_string();
        let mut source = std::error::Error::source(self);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        message
    }

    pub(crate) fn browser(action: &'static str, source: anyhow::Error) -> Self {
        Self::Browser { action, source }
    }

    pub(crate) fn navigation(url: &str, source: anyhow::Error) -> Self {
        Self::Navigation { url: url.to_string(), source }
    }

    pub(crate) fn missing(xpath: &str) -> Self {
        Self::MissingElement { xpath: xpath.to_string() }
    }
}


impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Setup => "setup",
            Self::Navigation => "navigation",
            Self::Extraction => "extraction",
            Self::Browser => "browser",
            Self::Persistence => "persistence"
        };
        f.write_str(name)
    }
}


pub type ScrapeResult<T> = Result<T, ScrapeError>;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_element_is_an_extraction_failure() {
        let err = ScrapeError::missing("/html/body/h1");
        assert_eq!(err.kind(), ErrorKind::Extraction);
        assert_eq!(err.to_string(), "no element matches xpath /html/body/h1");
    }

    #[test]
    fn navigation_keeps_its_source() {
        let err = ScrapeError::navigation("https://example.com", anyhow::anyhow!("timed out"));
        assert_eq!(err.kind(), ErrorKind::Navigation);
        let source = std::error::Error::source(&err).map(|s| s.to_string());
        assert_eq!(source.as_deref(), Some("timed out"));
        assert_eq!(err.full_message(), "failed to navigate to https://example.com: timed out");
    }
}
