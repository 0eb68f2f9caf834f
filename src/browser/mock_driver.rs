use super::PageDriver;
use crate::{HarvestError, HarvestResult};
use async_trait::async_trait;
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone)]
pub enum MockPage {
    Html(String),
    /// Navigation fails with the given reason.
    Fail(String),
    /// Navigation never settles; surfaces as a timeout.
    Hang,
}

/// A scripted site served from memory. Selectors are evaluated against the
/// stored markup, and clicking follows the matched element's `href`. Clones
/// share the closed flag, so a clone kept aside can observe `close`.
#[derive(Debug, Clone, Default)]
pub struct MockDriver {
    pages: HashMap<String, MockPage>,
    current: Option<(Url, String)>,
    history: Vec<String>,
    closed: Arc<AtomicBool>,
}

impl MockDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: impl Into<String>) -> Self {
        self.pages.insert(normalize(url), MockPage::Html(html.into()));
        self
    }

    pub fn with_failure(mut self, url: &str, reason: &str) -> Self {
        self.pages.insert(normalize(url), MockPage::Fail(reason.to_string()));
        self
    }

    pub fn with_hang(mut self, url: &str) -> Self {
        self.pages.insert(normalize(url), MockPage::Hang);
        self
    }

    /// Every URL that was loaded, by navigation or by click, in order.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn load(&mut self, url: Url, limit: Duration) -> HarvestResult<()> {
        if self.is_closed() {
            return Err(HarvestError::ScriptError("driver is closed".to_string()));
        }
        self.history.push(url.to_string());

        match self.pages.get(url.as_str()) {
            Some(MockPage::Html(html)) => {
                self.current = Some((url, html.clone()));
                Ok(())
            }
            Some(MockPage::Fail(reason)) => Err(HarvestError::NavigationError {
                url: url.to_string(),
                reason: reason.clone(),
            }),
            Some(MockPage::Hang) => Err(HarvestError::timeout(format!("loading {}", url), limit)),
            None => Err(HarvestError::NavigationError {
                url: url.to_string(),
                reason: "404 Not Found".to_string(),
            }),
        }
    }

    fn current(&self) -> HarvestResult<&(Url, String)> {
        self.current
            .as_ref()
            .ok_or_else(|| HarvestError::ScriptError("no page loaded".to_string()))
    }

    fn query<R>(
        &self,
        selector: &str,
        f: impl FnOnce(Option<ElementRef<'_>>) -> R,
    ) -> HarvestResult<R> {
        let (_, html) = self.current()?;
        let selector = Selector::parse(selector).map_err(|e| {
            HarvestError::ScriptError(format!("invalid selector `{}`: {:?}", selector, e))
        })?;
        let document = Html::parse_document(html);
        let result = f(document.select(&selector).next());
        Ok(result)
    }
}

fn normalize(url: &str) -> String {
    Url::parse(url)
        .map(|u| u.to_string())
        .unwrap_or_else(|_| url.to_string())
}

#[async_trait]
impl PageDriver for MockDriver {
    async fn navigate(&mut self, url: &Url, limit: Duration) -> HarvestResult<()> {
        self.load(url.clone(), limit)
    }

    async fn wait_for_selector(&mut self, selector: &str, limit: Duration) -> HarvestResult<()> {
        if self.query(selector, |el| el.is_some())? {
            Ok(())
        } else {
            Err(HarvestError::timeout(format!("waiting for `{}`", selector), limit))
        }
    }

    async fn exists(&mut self, selector: &str) -> HarvestResult<bool> {
        self.query(selector, |el| el.is_some())
    }

    async fn has_class(&mut self, selector: &str, class: &str) -> HarvestResult<Option<bool>> {
        self.query(selector, |el| el.map(|el| el.value().classes().any(|c| c == class)))
    }

    async fn outer_html(&mut self) -> HarvestResult<String> {
        Ok(self.current()?.1.clone())
    }

    async fn click_and_wait(&mut self, selector: &str, limit: Duration) -> HarvestResult<()> {
        let target = self.query(selector, |el| {
            el.map(|el| el.value().attr("href").map(str::to_string))
        })?;
        let Some(target) = target else {
            return Err(HarvestError::ScriptError(format!(
                "no element matches `{}`",
                selector
            )));
        };
        // An anchor without href never navigates.
        let Some(href) = target else {
            return Err(HarvestError::timeout(
                format!("waiting for navigation after clicking `{}`", selector),
                limit,
            ));
        };

        let target = self.current()?.0.join(&href)?;
        self.load(target, limit)
    }

    async fn close(&mut self) -> HarvestResult<()> {
        self.closed.store(true, Ordering::SeqCst);
        self.current = None;
        Ok(())
    }
}
