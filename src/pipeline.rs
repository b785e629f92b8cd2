//! Drives a scraping run: launch the browser, discover links on every platform, extract a record
//! per link, then persist everything.
//!
//! The run is strictly sequential. Platforms are visited in registration order and links in the
//! order they were discovered. Only failing to launch the browser aborts a run. Any other failure
//! is recorded against the platform, link or row it happened on and the run moves on.

use std::fmt;

use tracing::{error, info, warn};

use crate::{
    browser::{Browser, Launcher, ScopedPage},
    datasource::Table,
    error::{ScrapeError, ScrapeResult},
    page_scrapers::{JobRecord, ScraperRegistry},
    tech_match::{MatchStats, TechMatcher}
};


#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Idle,
    BrowserReady,
    LinksDiscovered,
    RecordsExtracted,
    Persisted,
    Closed
}


impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::BrowserReady => "browser ready",
            Self::LinksDiscovered => "links discovered",
            Self::RecordsExtracted => "records extracted",
            Self::Persisted => "persisted",
            Self::Closed => "closed"
        };
        f.write_str(name)
    }
}


/// What a run collected for one platform. Discarded once it has been persisted.
#[derive(Debug, Default)]
pub struct PlatformState {
    pub links: Vec<String>,
    pub records: Vec<JobRecord>
}


/// A link or row that could not be processed.
#[derive(Debug)]
pub struct ItemFailure {
    pub url: String,
    pub error: ScrapeError
}


#[derive(Debug)]
pub struct PlatformReport {
    pub name: &'static str,
    pub links: usize,
    /// Set when link discovery failed. The platform is skipped for the rest of the run.
    pub discovery_error: Option<ScrapeError>,
    /// Set when no page could be opened to extract records with.
    pub page_error: Option<ScrapeError>,
    pub records: usize,
    pub link_failures: Vec<ItemFailure>,
    pub rows_written: usize,
    pub row_failures: Vec<ItemFailure>,
    /// Pages that could not be closed and may still be open in the browser.
    pub close_failures: Vec<ScrapeError>
}


impl PlatformReport {
    fn new(name: &'static str) -> Self {
        Self {
            name,
            links: 0,
            discovery_error: None,
            page_error: None,
            records: 0,
            link_failures: Vec::new(),
            rows_written: 0,
            row_failures: Vec::new(),
            close_failures: Vec::new()
        }
    }

    fn record_close(&mut self, result: ScrapeResult<()>) {
        if let Err(e) = result {
            warn!("Failed to close a page for {}: {}", self.name, e.full_message());
            self.close_failures.push(e);
        }
    }

    pub fn is_success(&self) -> bool {
        self.discovery_error.is_none()
            && self.page_error.is_none()
            && self.link_failures.is_empty()
            && self.row_failures.is_empty()
            && self.close_failures.is_empty()
    }
}


/// The outcome of a run that got past launching the browser.
#[derive(Debug)]
pub struct RunReport {
    /// One entry per registered platform, in registration order.
    pub platforms: Vec<PlatformReport>,
    /// Set when the table could not be created, in which case no rows were written.
    pub persistence_error: Option<ScrapeError>,
    pub match_stats: MatchStats
}


impl RunReport {
    pub fn is_success(&self) -> bool {
        self.persistence_error.is_none() && self.platforms.iter().all(PlatformReport::is_success)
    }

    pub fn rows_written(&self) -> usize {
        self.platforms.iter().map(|x| x.rows_written).sum()
    }

    pub fn platform(&self, name: &str) -> Option<&PlatformReport> {
        self.platforms.iter().find(|x| x.name == name)
    }
}


impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for platform in &self.platforms {
            writeln!(
                f,
                "{}: {} links, {} records, {} rows written",
                platform.name, platform.links, platform.records, platform.rows_written
            )?;
            if let Some(e) = &platform.discovery_error {
                writeln!(f, "  link discovery failed: {}", e.full_message())?;
            }
            if let Some(e) = &platform.page_error {
                writeln!(f, "  record extraction failed: {}", e.full_message())?;
            }
            for failure in &platform.link_failures {
                writeln!(f, "  {} failed ({}): {}", failure.url, failure.error.kind(), failure.error.full_message())?;
            }
            for failure in &platform.row_failures {
                writeln!(f, "  {} was not saved: {}", failure.url, failure.error.full_message())?;
            }
            for e in &platform.close_failures {
                writeln!(f, "  page could not be closed: {}", e.full_message())?;
            }
        }
        if let Some(e) = &self.persistence_error {
            writeln!(f, "nothing was saved: {}", e.full_message())?;
        }
        write!(
            f,
            "{} rows written, {} technology lookups ({} cached)",
            self.rows_written(),
            self.match_stats.lookups,
            self.match_stats.cache_hits
        )
    }
}


pub struct Pipeline {
    registry: ScraperRegistry,
    matcher: TechMatcher,
    table: Box<dyn Table<JobRecord>>,
    role: String,
    stage: Stage
}


impl Pipeline {
    pub fn new(registry: ScraperRegistry, matcher: TechMatcher, table: Box<dyn Table<JobRecord>>, role: impl Into<String>) -> Self {
        Self { registry, matcher, table, role: role.into(), stage: Stage::Idle }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn matcher(&self) -> &TechMatcher {
        &self.matcher
    }

    pub fn table(&self) -> &dyn Table<JobRecord> {
        self.table.as_ref()
    }

    fn advance(&mut self, next: Stage) {
        debug_assert!(next > self.stage, "pipeline cannot go from {} back to {next}", self.stage);
        info!("Pipeline stage: {next}");
        self.stage = next;
    }

    /// Runs every stage once. A pipeline is single use.
    ///
    /// Returns an error only if the browser could not be launched. Everything else that goes wrong
    /// is listed in the returned report.
    pub fn run<L: Launcher>(&mut self, launcher: &L) -> ScrapeResult<RunReport> {
        if self.stage != Stage::Idle {
            return Err(ScrapeError::Setup(anyhow::anyhow!("pipeline has already run (stage: {})", self.stage)));
        }

        let browser = match launcher.launch() {
            Ok(browser) => browser,
            Err(e) => {
                error!("Could not launch the browser: {}", e.full_message());
                self.advance(Stage::Closed);
                return Err(e);
            }
        };
        self.advance(Stage::BrowserReady);

        if self.registry.is_empty() {
            warn!("No platforms registered, the run will only create the table");
        }
        let mut reports: Vec<PlatformReport> = self.registry.iter().map(|x| PlatformReport::new(x.name())).collect();
        let mut states: Vec<PlatformState> = reports.iter().map(|_| PlatformState::default()).collect();

        self.discover_links(&browser, &mut states, &mut reports);
        self.advance(Stage::LinksDiscovered);

        self.extract_records(&browser, &mut states, &mut reports);
        self.advance(Stage::RecordsExtracted);

        let persistence_error = self.persist(&states, &mut reports);
        self.advance(Stage::Persisted);

        drop(browser);
        self.advance(Stage::Closed);

        let report = RunReport { platforms: reports, persistence_error, match_stats: self.matcher.stats() };
        info!(
            "Run finished: {} rows written, {} technology lookups, {} cache hits",
            report.rows_written(),
            report.match_stats.lookups,
            report.match_stats.cache_hits
        );
        Ok(report)
    }

    fn discover_links<B: Browser>(&self, browser: &B, states: &mut [PlatformState], reports: &mut [PlatformReport]) {
        for ((scraper, state), report) in self.registry.iter().zip(states).zip(reports) {
            let url = scraper.listing_url(&self.role);
            info!("Discovering job links on {} from {url}", scraper.name());

            // The page only lives for this platform's discovery
            let result = match browser.new_page() {
                Ok(page) => {
                    let page = ScopedPage::new(page, format!("{} link discovery", scraper.name()));
                    let links = scraper.discover_links(&*page, &url);
                    report.record_close(page.close());
                    links
                }
                Err(e) => Err(e)
            };

            match result {
                Ok(links) => {
                    info!("Found {} job links on {}", links.len(), scraper.name());
                    report.links = links.len();
                    state.links = links;
                }
                Err(e) => {
                    warn!("Link discovery on {} failed: {}", scraper.name(), e.full_message());
                    report.discovery_error = Some(e);
                }
            }
        }
    }

    fn extract_records<B: Browser>(&mut self, browser: &B, states: &mut [PlatformState], reports: &mut [PlatformReport]) {
        let Self { registry, matcher, .. } = self;

        for ((scraper, state), report) in registry.iter().zip(states).zip(reports) {
            if state.links.is_empty() {
                continue;
            }

            let page = match browser.new_page() {
                Ok(page) => ScopedPage::new(page, format!("{} record extraction", scraper.name())),
                Err(e) => {
                    warn!("Could not open a page for {}: {}", scraper.name(), e.full_message());
                    report.page_error = Some(e);
                    continue;
                }
            };

            for link in &state.links {
                match scraper.extract_record(&*page, link, matcher) {
                    Ok(record) => state.records.push(record),
                    Err(e) => {
                        warn!("Failed to extract {link}: {}", e.full_message());
                        report.link_failures.push(ItemFailure { url: link.clone(), error: e });
                    }
                }
            }
            report.record_close(page.close());
            report.records = state.records.len();
            info!(
                "Extracted {} of {} job postings from {}",
                state.records.len(),
                state.links.len(),
                scraper.name()
            );
        }
    }

    fn persist(&mut self, states: &[PlatformState], reports: &mut [PlatformReport]) -> Option<ScrapeError> {
        if let Err(e) = self.table.create() {
            error!("Could not create table {}: {}", self.table.name(), e.full_message());
            return Some(e);
        }

        for (state, report) in states.iter().zip(reports) {
            info!("Inserting {} job postings from {} into {}", state.records.len(), report.name, self.table.name());
            for record in &state.records {
                match self.table.post_row(record) {
                    Ok(()) => report.rows_written += 1,
                    Err(e) => {
                        warn!("Failed to save {}: {}", record.url, e.full_message());
                        report.row_failures.push(ItemFailure { url: record.url.clone(), error: e });
                    }
                }
            }
        }
        None
    }
}

