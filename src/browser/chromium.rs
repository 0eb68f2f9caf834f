use super::stealth::{launch_args, stealth_script};
use super::PageDriver;
use crate::core::config::BrowserOptions;
use crate::{HarvestError, HarvestResult};
use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::network::SetUserAgentOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::AddScriptToEvaluateOnNewDocumentParams;
use chromiumoxide::{Browser, BrowserConfig, Handler, Page};
use futures::StreamExt;
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use url::Url;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

const OUTER_HTML_SCRIPT: &str = "document.documentElement.outerHTML";
const MARK_DOCUMENT_SCRIPT: &str = "window.__setharvestStale = true; true";
const DOCUMENT_REPLACED_SCRIPT: &str =
    "window.__setharvestStale !== true && document.readyState === 'complete'";

/// Chrome over the DevTools protocol, either launched by us or reached through
/// a remote debugging endpoint.
pub struct ChromiumDriver {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    remote: bool,
}

impl ChromiumDriver {
    pub async fn start(options: &BrowserOptions) -> HarvestResult<Self> {
        match &options.remote_url {
            Some(url) => Self::connect(url, options).await,
            None => Self::launch(options).await,
        }
    }

    pub async fn launch(options: &BrowserOptions) -> HarvestResult<Self> {
        info!(
            "Launching browser (headless={}, stealth={})",
            options.headless, options.stealth
        );

        let mut builder = BrowserConfig::builder().request_timeout(options.request_timeout());
        if !options.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &options.executable {
            builder = builder.chrome_executable(path);
        }
        for arg in launch_args(options) {
            builder = builder.arg(arg);
        }
        let config = builder
            .build()
            .map_err(|e| HarvestError::ConfigError(format!("invalid browser config: {}", e)))?;

        let (browser, handler) = Browser::launch(config).await?;
        Self::attach(browser, handler, options, false).await
    }

    pub async fn connect(endpoint: &str, options: &BrowserOptions) -> HarvestResult<Self> {
        let ws_url = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            discover_websocket_url(endpoint).await?
        } else {
            endpoint.to_string()
        };

        info!("Connecting to remote browser at {}", ws_url);
        let (browser, handler) = Browser::connect(ws_url).await?;
        Self::attach(browser, handler, options, true).await
    }

    async fn attach(
        browser: Browser,
        mut handler: Handler,
        options: &BrowserOptions,
        remote: bool,
    ) -> HarvestResult<Self> {
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser event error: {}", e);
                }
            }
        });

        let page = match open_page(&browser, options).await {
            Ok(page) => page,
            Err(e) => {
                handler.abort();
                return Err(e);
            }
        };

        Ok(Self {
            browser,
            page,
            handler,
            remote,
        })
    }
}

async fn evaluate<T: DeserializeOwned>(page: &Page, script: &str) -> HarvestResult<T> {
    let result = page.evaluate(script).await?;
    result
        .into_value()
        .map_err(|e| HarvestError::ScriptError(format!("unexpected result of `{}`: {}", script, e)))
}

/// Polls `script` until it yields `true`. Evaluation errors while the page is
/// in flight count as "not yet".
async fn wait_for_script(
    page: &Page,
    script: &str,
    limit: Duration,
    operation: String,
) -> HarvestResult<()> {
    let poll = async {
        loop {
            match evaluate::<bool>(page, script).await {
                Ok(true) => return,
                Ok(false) => {}
                Err(e) => debug!("Poll of `{}` failed: {}", script, e),
            }
            sleep(POLL_INTERVAL).await;
        }
    };
    timeout(limit, poll)
        .await
        .map_err(|_| HarvestError::timeout(operation, limit))
}

async fn open_page(browser: &Browser, options: &BrowserOptions) -> HarvestResult<Page> {
    let page = browser.new_page("about:blank").await?;
    // Registered before the first navigation so every document gets it.
    if options.stealth {
        page.execute(AddScriptToEvaluateOnNewDocumentParams::new(stealth_script()))
            .await?;
    }
    if let Some(user_agent) = &options.user_agent {
        page.execute(SetUserAgentOverrideParams::new(user_agent.clone())).await?;
    }
    Ok(page)
}

#[async_trait]
impl PageDriver for ChromiumDriver {
    async fn navigate(&mut self, url: &Url, limit: Duration) -> HarvestResult<()> {
        debug!("Navigating to {}", url);
        let page = &self.page;
        let load = async {
            page.goto(url.as_str()).await?;
            page.wait_for_navigation().await?;
            Ok::<(), HarvestError>(())
        };
        timeout(limit, load)
            .await
            .map_err(|_| HarvestError::timeout(format!("loading {}", url), limit))?
    }

    async fn wait_for_selector(&mut self, selector: &str, limit: Duration) -> HarvestResult<()> {
        let script = exists_script(selector)?;
        wait_for_script(&self.page, &script, limit, format!("waiting for `{}`", selector)).await
    }

    async fn exists(&mut self, selector: &str) -> HarvestResult<bool> {
        evaluate(&self.page, &exists_script(selector)?).await
    }

    async fn has_class(&mut self, selector: &str, class: &str) -> HarvestResult<Option<bool>> {
        let state: String = evaluate(&self.page, &class_state_script(selector, class)?).await?;
        match state.as_str() {
            "present" => Ok(Some(true)),
            "absent" => Ok(Some(false)),
            "missing" => Ok(None),
            other => Err(HarvestError::ScriptError(format!(
                "unexpected class state `{}` for `{}`",
                other, selector
            ))),
        }
    }

    async fn outer_html(&mut self) -> HarvestResult<String> {
        evaluate(&self.page, OUTER_HTML_SCRIPT).await
    }

    async fn click_and_wait(&mut self, selector: &str, limit: Duration) -> HarvestResult<()> {
        // The marker lives on the current window object and disappears with it.
        evaluate::<bool>(&self.page, MARK_DOCUMENT_SCRIPT).await?;

        let element = self.page.find_element(selector).await?;
        element.click().await?;

        wait_for_script(
            &self.page,
            DOCUMENT_REPLACED_SCRIPT,
            limit,
            format!("waiting for navigation after clicking `{}`", selector),
        )
        .await
    }

    async fn close(&mut self) -> HarvestResult<()> {
        if self.remote {
            self.page.clone().close().await?;
        } else {
            self.browser.close().await?;
            if let Err(e) = self.browser.wait().await {
                warn!("Browser process did not exit cleanly: {}", e);
            }
        }
        self.handler.abort();
        info!("Browser closed");
        Ok(())
    }
}

impl Drop for ChromiumDriver {
    fn drop(&mut self) {
        self.handler.abort();
    }
}

/// Resolves an `http(s)://host:port` DevTools endpoint to its websocket URL.
pub async fn discover_websocket_url(endpoint: &str) -> HarvestResult<String> {
    let version_url = format!("{}/json/version", endpoint.trim_end_matches('/'));
    debug!("Resolving DevTools endpoint via {}", version_url);

    let resp: serde_json::Value = reqwest::Client::new()
        .get(&version_url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    resp.get("webSocketDebuggerUrl")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            HarvestError::ConfigError(format!("no webSocketDebuggerUrl in {}", version_url))
        })
}

fn exists_script(selector: &str) -> HarvestResult<String> {
    Ok(format!(
        "document.querySelector({}) !== null",
        serde_json::to_string(selector)?
    ))
}

fn class_state_script(selector: &str, class: &str) -> HarvestResult<String> {
    Ok(format!(
        "(() => {{ const el = document.querySelector({}); \
         if (!el) return 'missing'; \
         return el.classList.contains({}) ? 'present' : 'absent'; }})()",
        serde_json::to_string(selector)?,
        serde_json::to_string(class)?
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_scripts_quote_selectors() {
        let script = exists_script(r#"a.pagination-control[aria-label="Next page"]"#).unwrap();
        assert_eq!(
            script,
            r#"document.querySelector("a.pagination-control[aria-label=\"Next page\"]") !== null"#
        );

        let script = class_state_script("a.next", "disabled").unwrap();
        assert!(script.contains(r#"document.querySelector("a.next")"#));
        assert!(script.contains(r#"classList.contains("disabled")"#));
    }

    #[tokio::test]
    async fn test_discover_websocket_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Browser": "Chrome/120.0.0.0",
                "webSocketDebuggerUrl": "ws://127.0.0.1:9222/devtools/browser/abc"
            })))
            .mount(&server)
            .await;

        let ws_url = discover_websocket_url(&format!("{}/", server.uri()))
            .await
            .unwrap();

        assert_eq!(ws_url, "ws://127.0.0.1:9222/devtools/browser/abc");
    }

    #[tokio::test]
    async fn test_discover_websocket_url_without_field() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "Browser": "x" })))
            .mount(&server)
            .await;

        let result = discover_websocket_url(&server.uri()).await;

        assert!(matches!(result, Err(HarvestError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_discover_websocket_url_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/json/version"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let result = discover_websocket_url(&server.uri()).await;

        assert!(matches!(result, Err(HarvestError::HttpError(_))));
    }
}
