use std::{sync::OnceLock, thread, time::Duration};

use fxhash::FxHashSet;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::debug;
use url::Url;

use crate::{browser::Page, error::{ScrapeError, ScrapeResult}, tech_match::TechMatcher};

use self::computrabajo::ComputrabajoScraper;

pub mod computrabajo;


pub const DEFAULT_SCRAPERS: [&str; 1] = [ComputrabajoScraper::NAME];
pub const DEFAULT_DELAY: Duration = Duration::from_secs(5);


/// A single job posting as scraped from a platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobRecord {
    pub title: String,
    pub subtitle: String,
    pub company: String,
    pub location: String,
    /// Short labels shown next to the posting, in page order.
    pub tags: Vec<String>,
    pub requirements: Vec<String>,
    /// The first tag that mentions a currency amount.
    pub salary: Option<String>,
    /// The first requirement that mentions experience.
    pub experience: Option<String>,
    /// Canonical technology names mentioned in the description, without duplicates, in the order
    /// they first appear.
    pub technologies: Vec<String>,
    pub url: String
}


/// Settings every scraper is constructed with.
#[derive(Debug, Clone, Copy)]
pub struct ScraperSettings {
    /// How many listing pages to walk during link discovery.
    pub pages: usize,
    /// Pause after each page load so the site is not hammered.
    pub delay: Duration
}


impl Default for ScraperSettings {
    fn default() -> Self {
        Self { pages: 1, delay: DEFAULT_DELAY }
    }
}


/// One job listing website.
///
/// Adding a platform means implementing this trait and registering it in a
/// [`ScraperRegistry`]. The pipeline never needs to know which site it is talking to.
pub trait PageScraper: Send {
    fn name(&self) -> &'static str;

    /// The listing URL that searching for `role` on this platform starts from.
    fn listing_url(&self, role: &str) -> String;

    /// Walks the listing pages starting at `url` and returns every posting link, in page order.
    /// Links are not deduplicated.
    fn discover_links(&self, page: &dyn Page, url: &str) -> ScrapeResult<Vec<String>>;

    /// Loads the posting at `url` and reads it into a record.
    fn extract_record(&self, page: &dyn Page, url: &str, matcher: &mut TechMatcher) -> ScrapeResult<JobRecord>;
}


/// The platforms a run scrapes, in the order they were registered.
#[derive(Default)]
pub struct ScraperRegistry {
    scrapers: Vec<Box<dyn PageScraper>>
}


impl ScraperRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a registry of the built in scrapers named in `names`.
    pub fn from_names<S: AsRef<str>>(names: &[S], settings: ScraperSettings) -> anyhow::Result<Self> {
        let mut registry = Self::new();
        for name in names {
            let scraper: Box<dyn PageScraper> = match name.as_ref() {
                ComputrabajoScraper::NAME => Box::new(ComputrabajoScraper::new(settings)),
                other => anyhow::bail!(
                    "Unknown platform {other}. Available platforms: {}",
                    DEFAULT_SCRAPERS.join(", ")
                )
            };
            registry.register(scraper)?;
        }
        Ok(registry)
    }

    /// Adds a scraper. Names must be unique.
    pub fn register(&mut self, scraper: Box<dyn PageScraper>) -> anyhow::Result<()> {
        if self.get(scraper.name()).is_some() {
            anyhow::bail!("Platform {} is already registered", scraper.name());
        }
        self.scrapers.push(scraper);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn PageScraper> {
        self.scrapers.iter().find(|x| x.name() == name).map(|x| x.as_ref())
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn PageScraper> {
        self.scrapers.iter().map(|x| x.as_ref())
    }

    pub fn len(&self) -> usize {
        self.scrapers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scrapers.is_empty()
    }
}


/// Blocks the run for `delay`. This is the only rate limiting the scrapers do.
pub(crate) fn pause(delay: Duration) {
    if !delay.is_zero() {
        thread::sleep(delay);
    }
}


/// Turns a role into the form job sites expect in their URLs, e.g. `"Rust Developer"` into
/// `"rust-developer"`.
pub fn role_slug(role: &str) -> String {
    role.split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join("-")
}


/// Absolute targets of every anchor in `html` matching the CSS selector `selector`, in document
/// order. Relative links are resolved against `base_url`.
pub fn links_matching(html: &str, base_url: &str, selector: &str) -> ScrapeResult<Vec<String>> {
    let selector = Selector::parse(selector)
        .map_err(|e| ScrapeError::Extraction(format!("invalid selector {selector}: {e}")))?;
    let base = Url::parse(base_url)
        .map_err(|e| ScrapeError::Extraction(format!("page url {base_url} is not valid: {e}")))?;

    let document = Html::parse_document(html);
    let links = document
        .select(&selector)
        .filter_map(|x| x.value().attr("href"))
        .filter_map(|href| match base.join(href) {
            Ok(url) => Some(url.to_string()),
            Err(e) => {
                debug!("Skipping unresolvable link {href}: {e}");
                None
            }
        })
        .collect();
    Ok(links)
}


/// Splits a "company - location" line into its two trimmed halves. Only the first two segments
/// are used.
pub fn split_subtitle(subtitle: &str, delimiter: char) -> ScrapeResult<(String, String)> {
    let mut parts = subtitle.split(delimiter);
    let company = parts.next().unwrap_or_default().trim();
    let location = parts.next().map(str::trim).ok_or_else(|| {
        ScrapeError::Extraction(format!("subtitle {subtitle:?} has no {delimiter:?} between company and location"))
    })?;
    Ok((company.to_string(), location.to_string()))
}


/// The first tag that mentions a currency amount.
pub fn find_salary(tags: &[String]) -> Option<String> {
    tags.iter().find(|x| x.contains('$')).cloned()
}


/// The first requirement containing any of `markers`, ignoring case.
pub fn find_experience(requirements: &[String], markers: &[&str]) -> Option<String> {
    requirements
        .iter()
        .find(|x| {
            let lower = x.to_lowercase();
            markers.iter().any(|m| lower.contains(&m.to_lowercase()))
        })
        .cloned()
}


fn word_separator() -> &'static Regex {
    static WORD_SEPARATOR: OnceLock<Regex> = OnceLock::new();
    // `+`, `#` and `.` stay inside words so C++, C# and Node.js survive
    WORD_SEPARATOR.get_or_init(|| Regex::new(r#"[\s,;:!?¿¡()\[\]{}"'/|]+"#).expect("word separator regex is valid"))
}


/// Splits free text into candidate words.
pub fn words(text: &str) -> impl Iterator<Item = &str> {
    word_separator()
        .split(text)
        .map(|x| x.trim_end_matches('.'))
        .filter(|x| !x.is_empty())
}


/// Canonical technology names mentioned in `text`, deduplicated, in the order they first appear.
pub fn extract_technologies(text: &str, matcher: &mut TechMatcher) -> Vec<String> {
    let mut seen = FxHashSet::default();
    let mut technologies = Vec::new();
    for word in words(text) {
        if let Some(name) = matcher.resolve(word) {
            if seen.insert(name.to_string()) {
                technologies.push(name.to_string());
            }
        }
    }
    technologies
}
