use anyhow::Context;
use clap::Parser;
use tokio::fs::DirBuilder;
use tracing::info;

use job_scraper::{
    browser::ChromeLauncher,
    config::{Cli, Config},
    logging,
    page_scrapers::ScraperRegistry,
    pipeline::Pipeline,
    tech_match::{Dictionary, TechMatcher}
};


#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::load(Cli::parse())?;
    logging::init(config.verbose);

    let dictionary = match &config.dictionary {
        Some(path) => {
            let source = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read dictionary {}", path.display()))?;
            Dictionary::from_toml(&source).with_context(|| format!("Failed to parse dictionary {}", path.display()))?
        }
        None => Dictionary::builtin()?
    };
    info!("Loaded {} technologies", dictionary.len());

    DirBuilder::new()
        .recursive(true)
        .create(&config.output)
        .await
        .context("Failed to create the output directory. Do we have permissions?")?;

    let registry = ScraperRegistry::from_names(&config.platforms, config.scraper_settings())?;
    let matcher = TechMatcher::new(dictionary, config.matcher_config());
    let table = config.datasource.open_jobs_table(&config.output);
    let launcher = ChromeLauncher::new(config.browser_config());
    let role = config.role.clone();

    // The browser driver blocks, so the whole sequential run gets a blocking thread
    let report = tokio::task::spawn_blocking(move || {
        let mut pipeline = Pipeline::new(registry, matcher, table, role);
        pipeline.run(&launcher)
    })
    .await??;

    println!("{report}");
    if !report.is_success() {
        anyhow::bail!("Some job postings could not be scraped or saved");
    }
    println!("Job postings scraped successfully!");
    Ok(())
}
