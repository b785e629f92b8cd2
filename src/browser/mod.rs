//! The browser capabilities the scrapers rely on.
//!
//! Everything here is a blocking call. The pipeline runs one page at a time, so each call is a
//! point where the run waits on the browser (launch, navigation, text retrieval).

use std::ops::Deref;

use tracing::{debug, warn};

use crate::error::ScrapeResult;

mod chrome;

pub use chrome::{BrowserConfig, ChromeLauncher, ChromePage, ChromeSession};


/// A single browser tab.
pub trait Page {
    /// Navigates to `url` and waits for the navigation to complete.
    fn goto(&self, url: &str) -> ScrapeResult<()>;

    /// The URL the page is currently showing.
    fn url(&self) -> String;

    /// The rendered HTML of the current document.
    fn content(&self) -> ScrapeResult<String>;

    /// Text of the first element matching `xpath`.
    fn text_by_xpath(&self, xpath: &str) -> ScrapeResult<String>;

    /// Text of every element matching `xpath`, in document order. Fails if nothing matches.
    fn texts_by_xpath(&self, xpath: &str) -> ScrapeResult<Vec<String>>;

    /// Trimmed text of every `li` below the first element matching `xpath`. Fails if the element
    /// is missing or has no list items.
    fn list_items_by_xpath(&self, xpath: &str) -> ScrapeResult<Vec<String>>;

    fn close(&self) -> ScrapeResult<()>;
}


/// A running browser that pages can be opened in.
pub trait Browser {
    type Page: Page;

    fn new_page(&self) -> ScrapeResult<Self::Page>;
}


/// Acquires a browser session. Failing to launch is fatal to a run.
pub trait Launcher {
    type Browser: Browser;

    fn launch(&self) -> ScrapeResult<Self::Browser>;
}


/// Closes the wrapped page when dropped, whichever way the scope is left.
///
/// Call [`ScopedPage::close`] to find out whether closing worked. Dropping only logs it.
pub struct ScopedPage<P: Page> {
    page: P,
    label: String,
    closed: bool
}


impl<P: Page> ScopedPage<P> {
    pub fn new(page: P, label: impl Into<String>) -> Self {
        let label = label.into();
        debug!("Opened page for {label}");
        Self { page, label, closed: false }
    }

    pub fn close(mut self) -> ScrapeResult<()> {
        self.closed = true;
        self.page.close()?;
        debug!("Closed page for {}", self.label);
        Ok(())
    }
}


impl<P: Page> Deref for ScopedPage<P> {
    type Target = P;

    fn deref(&self) -> &Self::Target {
        &self.page
    }
}


impl<P: Page> Drop for ScopedPage<P> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match self.page.close() {
            Ok(()) => debug!("Closed page for {}", self.label),
            Err(e) => warn!("Failed to close page for {}: {}", self.label, e.full_message())
        }
    }
}


#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::error::ScrapeError;

    struct CountingPage(Rc<Cell<usize>>);

    struct StuckPage;

    impl Page for StuckPage {
        fn goto(&self, _url: &str) -> ScrapeResult<()> {
            Ok(())
        }
        fn url(&self) -> String {
            String::new()
        }
        fn content(&self) -> ScrapeResult<String> {
            Ok(String::new())
        }
        fn text_by_xpath(&self, xpath: &str) -> ScrapeResult<String> {
            Err(ScrapeError::missing(xpath))
        }
        fn texts_by_xpath(&self, xpath: &str) -> ScrapeResult<Vec<String>> {
            Err(ScrapeError::missing(xpath))
        }
        fn list_items_by_xpath(&self, xpath: &str) -> ScrapeResult<Vec<String>> {
            Err(ScrapeError::missing(xpath))
        }
        fn close(&self) -> ScrapeResult<()> {
            Err(ScrapeError::browser("closing a tab", anyhow::anyhow!("tab is gone")))
        }
    }

    impl Page for CountingPage {
        fn goto(&self, url: &str) -> ScrapeResult<()> {
            Err(ScrapeError::navigation(url, anyhow::anyhow!("offline")))
        }
        fn url(&self) -> String {
            String::new()
        }
        fn content(&self) -> ScrapeResult<String> {
            Ok(String::new())
        }
        fn text_by_xpath(&self, xpath: &str) -> ScrapeResult<String> {
            Err(ScrapeError::missing(xpath))
        }
        fn texts_by_xpath(&self, xpath: &str) -> ScrapeResult<Vec<String>> {
            Err(ScrapeError::missing(xpath))
        }
        fn list_items_by_xpath(&self, xpath: &str) -> ScrapeResult<Vec<String>> {
            Err(ScrapeError::missing(xpath))
        }
        fn close(&self) -> ScrapeResult<()> {
            self.0.set(self.0.get() + 1);
            Ok(())
        }
    }

    fn failing_work(page: &dyn Page) -> ScrapeResult<String> {
        page.goto("https://example.com")?;
        page.text_by_xpath("//h1")
    }

    #[test]
    fn scoped_page_closes_on_error_path() {
        let closed = Rc::new(Cell::new(0));
        let result = {
            let page = ScopedPage::new(CountingPage(closed.clone()), "test");
            failing_work(&*page)
        };
        assert!(result.is_err());
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn scoped_page_closes_once() {
        let closed = Rc::new(Cell::new(0));
        let page = ScopedPage::new(CountingPage(closed.clone()), "test");
        assert_eq!(page.url(), "");
        drop(page);
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn explicit_close_is_not_repeated_on_drop() {
        let closed = Rc::new(Cell::new(0));
        let page = ScopedPage::new(CountingPage(closed.clone()), "test");
        page.close().unwrap();
        assert_eq!(closed.get(), 1);
    }

    #[test]
    fn explicit_close_returns_the_failure() {
        let err = ScopedPage::new(StuckPage, "test").close().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Browser);
    }
}
