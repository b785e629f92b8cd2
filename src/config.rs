use std::{path::PathBuf, time::Duration};

use anyhow::Context;
use clap::Parser;
use serde::Deserialize;
use validator::Validate;

use crate::{
    browser::BrowserConfig,
    datasource::DatasourceKind,
    page_scrapers::{ScraperSettings, DEFAULT_DELAY, DEFAULT_SCRAPERS},
    tech_match::{MatcherConfig, DEFAULT_MAX_DISTANCE, DEFAULT_MIN_LENGTH}
};

pub const DEFAULT_OUTPUT: &str = "out";


#[derive(Parser, Debug, Default)]
#[command(name = "job-scraper", about = "Get job postings for a role and tag them with the technologies they mention")]
pub struct Cli {
    /// The role to search for
    #[arg(short, long)]
    pub role: Option<String>,

    /// The number of listing pages to retrieve per platform [default: 1]
    #[arg(short, long)]
    pub pages: Option<u32>,

    /// Words and technologies shorter than this only match exactly [default: 4]
    #[arg(short = 'm', long)]
    pub min_length: Option<u32>,

    /// The maximum edit distance between a word and the technology it is matched to [default: 2]
    #[arg(short = 'M', long)]
    pub max_distance: Option<u32>,

    /// The directory to write results to [default: out]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Log debug output
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// TOML file providing defaults for any of these options
    #[arg(long, env = "JOB_SCRAPER_CONFIG")]
    pub config: Option<PathBuf>,

    /// TOML file with `technologies` and `excluded` lists replacing the built in dictionary
    #[arg(long)]
    pub dictionary: Option<PathBuf>,

    /// Milliseconds to wait after each page load [default: 5000]
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Path to the Chrome or Chromium executable
    #[arg(long, env = "CHROME")]
    pub chrome: Option<PathBuf>,

    /// Show the browser window
    #[arg(long, default_value_t = false)]
    pub headful: bool,

    /// Where to store scraped postings [default: csv]
    #[arg(long, value_enum)]
    pub datasource: Option<DatasourceKind>,

    /// Platform to scrape, can be repeated [default: all]
    #[arg(long = "platform")]
    pub platforms: Vec<String>
}


/// The same options as [`Cli`], read from a config file.
#[derive(Deserialize, Debug, Default)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    role: Option<String>,
    pages: Option<u32>,
    min_length: Option<u32>,
    max_distance: Option<u32>,
    output: Option<PathBuf>,
    #[serde(default)]
    verbose: bool,
    dictionary: Option<PathBuf>,
    delay_ms: Option<u64>,
    chrome: Option<PathBuf>,
    #[serde(default)]
    headful: bool,
    datasource: Option<DatasourceKind>,
    #[serde(default)]
    platforms: Vec<String>
}


impl FileConfig {
    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        toml::from_str(source).context("Config file is not valid")
    }
}


/// Everything a run needs, after command line flags have been merged over the config file.
#[derive(Debug, Clone, Validate)]
pub struct Config {
    #[validate(length(min = 1, message = "a role to search for is required"))]
    pub role: String,
    #[validate(range(min = 1, max = 100))]
    pub pages: u32,
    #[validate(range(min = 1))]
    pub min_length: u32,
    pub max_distance: u32,
    pub output: PathBuf,
    pub verbose: bool,
    pub dictionary: Option<PathBuf>,
    pub delay: Duration,
    pub chrome: Option<PathBuf>,
    pub headless: bool,
    pub datasource: DatasourceKind,
    #[validate(length(min = 1, message = "at least one platform is required"))]
    pub platforms: Vec<String>
}


impl Config {
    /// Reads the config file named by `cli`, if any, and merges `cli` over it.
    pub fn load(cli: Cli) -> anyhow::Result<Self> {
        let file = match &cli.config {
            Some(path) => {
                let source = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                FileConfig::from_toml(&source).with_context(|| format!("Failed to parse {}", path.display()))?
            }
            None => FileConfig::default()
        };
        Self::merge(cli, file)
    }

    pub fn merge(cli: Cli, file: FileConfig) -> anyhow::Result<Self> {
        let platforms = if !cli.platforms.is_empty() {
            cli.platforms
        } else if !file.platforms.is_empty() {
            file.platforms
        } else {
            DEFAULT_SCRAPERS.iter().map(|x| x.to_string()).collect()
        };

        let config = Self {
            role: cli.role.or(file.role).unwrap_or_default().trim().to_string(),
            pages: cli.pages.or(file.pages).unwrap_or(1),
            min_length: cli.min_length.or(file.min_length).unwrap_or(DEFAULT_MIN_LENGTH as u32),
            max_distance: cli.max_distance.or(file.max_distance).unwrap_or(DEFAULT_MAX_DISTANCE as u32),
            output: cli.output.or(file.output).unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            verbose: cli.verbose || file.verbose,
            dictionary: cli.dictionary.or(file.dictionary),
            delay: cli.delay_ms.or(file.delay_ms).map(Duration::from_millis).unwrap_or(DEFAULT_DELAY),
            chrome: cli.chrome.or(file.chrome),
            headless: !(cli.headful || file.headful),
            datasource: cli.datasource.or(file.datasource).unwrap_or_default(),
            platforms
        };
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    pub fn matcher_config(&self) -> MatcherConfig {
        MatcherConfig { min_length: self.min_length as usize, max_distance: self.max_distance as usize }
    }

    pub fn scraper_settings(&self) -> ScraperSettings {
        ScraperSettings { pages: self.pages as usize, delay: self.delay }
    }

    pub fn browser_config(&self) -> BrowserConfig {
        BrowserConfig { executable: self.chrome.clone(), headless: self.headless, ..Default::default() }
    }
}
