//! Scrapes job postings from job listing sites with a headless browser, tags each posting with
//! the technologies its description mentions, and stores the results.

pub mod browser;
pub mod config;
pub mod datasource;
pub mod error;
pub mod logging;
pub mod page_scrapers;
pub mod pipeline;
pub mod tech_match;

pub use error::{ErrorKind, ScrapeError, ScrapeResult};
pub use page_scrapers::JobRecord;
pub use pipeline::{Pipeline, RunReport};
