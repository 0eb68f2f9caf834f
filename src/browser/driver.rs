use crate::HarvestResult;
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// The handful of browser commands the harvester issues. One driver owns one
/// page and is used by one set at a time.
#[async_trait]
pub trait PageDriver: Send {
    /// Loads `url` and waits until the document has settled.
    async fn navigate(&mut self, url: &Url, timeout: Duration) -> HarvestResult<()>;

    async fn wait_for_selector(&mut self, selector: &str, timeout: Duration) -> HarvestResult<()>;

    async fn exists(&mut self, selector: &str) -> HarvestResult<bool>;

    /// Whether the first element matching `selector` carries `class`, or
    /// `None` when nothing matches.
    async fn has_class(&mut self, selector: &str, class: &str) -> HarvestResult<Option<bool>>;

    /// Full markup of the current document.
    async fn outer_html(&mut self) -> HarvestResult<String>;

    /// Clicks the first element matching `selector` and waits for the page it
    /// leads to.
    async fn click_and_wait(&mut self, selector: &str, timeout: Duration) -> HarvestResult<()>;

    async fn close(&mut self) -> HarvestResult<()>;
}
