use std::{path::PathBuf, sync::Arc, time::Duration};

use headless_chrome::{Browser as Chrome, LaunchOptions, Tab};
use tracing::{debug, info};

use super::{Browser, Launcher, Page};
use crate::error::{ScrapeError, ScrapeResult};


#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Browser executable. Chrome is searched for on the system when unset.
    pub executable: Option<PathBuf>,
    pub headless: bool,
    pub sandbox: bool,
    /// How long a single navigation or element query may take.
    pub timeout: Duration,
    /// How long the browser may sit without receiving commands before it is shut down.
    pub idle_timeout: Duration
}


impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
            sandbox: false,
            timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(300)
        }
    }
}


pub struct ChromeLauncher {
    config: BrowserConfig
}


impl ChromeLauncher {
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}


impl Launcher for ChromeLauncher {
    type Browser = ChromeSession;

    fn launch(&self) -> ScrapeResult<ChromeSession> {
        let options = LaunchOptions::default_builder()
            .headless(self.config.headless)
            .sandbox(self.config.sandbox)
            .path(self.config.executable.clone())
            .idle_browser_timeout(self.config.idle_timeout)
            .build()
            .map_err(|e| ScrapeError::Setup(anyhow::anyhow!("Invalid launch options: {e}")))?;

        let browser = Chrome::new(options).map_err(ScrapeError::Setup)?;
        info!("Launched browser (headless: {})", self.config.headless);
        Ok(ChromeSession { browser, timeout: self.config.timeout })
    }
}


/// A Chrome process. It is shut down when this is dropped.
pub struct ChromeSession {
    browser: Chrome,
    timeout: Duration
}


impl Browser for ChromeSession {
    type Page = ChromePage;

    fn new_page(&self) -> ScrapeResult<ChromePage> {
        let tab = self.browser.new_tab().map_err(|e| ScrapeError::browser("opening a tab", e))?;
        tab.set_default_timeout(self.timeout);
        Ok(ChromePage { tab })
    }
}


pub struct ChromePage {
    tab: Arc<Tab>
}


impl Page for ChromePage {
    fn goto(&self, url: &str) -> ScrapeResult<()> {
        debug!("Navigating to {url}");
        self.tab
            .navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map(|_| ())
            .map_err(|e| ScrapeError::navigation(url, e))
    }

    fn url(&self) -> String {
        self.tab.get_url()
    }

    fn content(&self) -> ScrapeResult<String> {
        self.tab.get_content().map_err(|e| ScrapeError::browser("reading page content", e))
    }

    fn text_by_xpath(&self, xpath: &str) -> ScrapeResult<String> {
        let element = self.tab.find_element_by_xpath(xpath).map_err(|e| {
            debug!("Lookup of {xpath} failed: {e:#}");
            ScrapeError::missing(xpath)
        })?;
        let text = element.get_inner_text().map_err(|e| ScrapeError::browser("reading element text", e))?;
        debug!("Found text {text:?} for xpath {xpath}");
        Ok(text)
    }

    fn texts_by_xpath(&self, xpath: &str) -> ScrapeResult<Vec<String>> {
        let elements = self.tab.find_elements_by_xpath(xpath).map_err(|e| {
            debug!("Lookup of {xpath} failed: {e:#}");
            ScrapeError::missing(xpath)
        })?;
        if elements.is_empty() {
            return Err(ScrapeError::missing(xpath));
        }
        debug!("Found {} elements for xpath {xpath}", elements.len());
        elements
            .iter()
            .map(|x| x.get_inner_text().map_err(|e| ScrapeError::browser("reading element text", e)))
            .collect()
    }

    fn list_items_by_xpath(&self, xpath: &str) -> ScrapeResult<Vec<String>> {
        let list = self.tab.find_element_by_xpath(xpath).map_err(|e| {
            debug!("Lookup of {xpath} failed: {e:#}");
            ScrapeError::missing(xpath)
        })?;
        let items = list.find_elements("li").map_err(|_| ScrapeError::missing(xpath))?;
        if items.is_empty() {
            return Err(ScrapeError::Extraction(format!("list at {xpath} has no items")));
        }
        items
            .iter()
            .map(|x| {
                x.get_inner_text()
                    .map(|text| text.trim().to_string())
                    .map_err(|e| ScrapeError::browser("reading list item text", e))
            })
            .collect()
    }

    fn close(&self) -> ScrapeResult<()> {
        self.tab.close(true).map(|_| ()).map_err(|e| ScrapeError::browser("closing a tab", e))
    }
}
