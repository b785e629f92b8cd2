use std::time::Duration;

use tracing::{debug, info};

use super::{
    extract_technologies, find_experience, find_salary, links_matching, pause, role_slug, split_subtitle,
    JobRecord, PageScraper, ScraperSettings
};
use crate::{browser::Page, error::ScrapeResult, tech_match::TechMatcher};

const JOB_LINK_SELECTOR: &str = "a[href^=\"/ofertas-de-trabajo/oferta-de-trabajo-de-\"]";
const TITLE_XPATH: &str = "/html/body/main/div[1]/h1";
const SUBTITLE_XPATH: &str = "/html/body/main/div[1]/p";
const TAGS_XPATH: &str = "/html/body/main/div[2]/div/div[2]/div[2]/div[1]/span";
const REQUIREMENTS_XPATH: &str = "/html/body/main/div[2]/div/div[2]/div[2]/ul";
const DESCRIPTION_XPATH: &str = "/html/body/main/div[2]/div/div[2]/div[2]/p[1]";
const EXPERIENCE_MARKERS: [&str; 2] = ["experiencia", "experience"];


/// A scraper for Computrabajo job listings in Medellín
pub struct ComputrabajoScraper {
    pages: usize,
    delay: Duration
}


impl ComputrabajoScraper {
    pub const NAME: &'static str = "computrabajo";

    pub fn new(settings: ScraperSettings) -> Self {
        Self { pages: settings.pages, delay: settings.delay }
    }
}


impl PageScraper for ComputrabajoScraper {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn listing_url(&self, role: &str) -> String {
        format!("https://co.computrabajo.com/trabajo-de-{}-en-medellin", role_slug(role))
    }

    fn discover_links(&self, page: &dyn Page, url: &str) -> ScrapeResult<Vec<String>> {
        info!("Getting job links from {url}");
        let mut links = Vec::new();
        for i in 1..=self.pages {
            page.goto(&format!("{url}?p={i}"))?;
            let found = links_matching(&page.content()?, &page.url(), JOB_LINK_SELECTOR)?;
            debug!("Found {} job links on page {i}", found.len());
            links.extend(found);
            pause(self.delay);
        }
        debug!("Found {} job links in total", links.len());
        Ok(links)
    }

    fn extract_record(&self, page: &dyn Page, url: &str, matcher: &mut TechMatcher) -> ScrapeResult<JobRecord> {
        let record = page.goto(url).and_then(|_| self.read_record(page, url, matcher));
        // Every visit waits, whether or not the posting could be read
        pause(self.delay);
        record
    }
}


impl ComputrabajoScraper {
    fn read_record(&self, page: &dyn Page, url: &str, matcher: &mut TechMatcher) -> ScrapeResult<JobRecord> {
        info!("Getting info for job {url}");

        let title = page.text_by_xpath(TITLE_XPATH)?.trim().to_string();
        let subtitle = page.text_by_xpath(SUBTITLE_XPATH)?.trim().to_string();
        let (company, location) = split_subtitle(&subtitle, '-')?;
        let tags: Vec<String> = page
            .texts_by_xpath(TAGS_XPATH)?
            .into_iter()
            .map(|x| x.trim().to_string())
            .collect();
        let requirements = page.list_items_by_xpath(REQUIREMENTS_XPATH)?;
        let description = page.text_by_xpath(DESCRIPTION_XPATH)?;

        let record = JobRecord {
            salary: find_salary(&tags),
            experience: find_experience(&requirements, &EXPERIENCE_MARKERS),
            technologies: extract_technologies(&description, matcher),
            title,
            subtitle,
            company,
            location,
            tags,
            requirements,
            url: url.to_string()
        };
        Ok(record)
    }
}
