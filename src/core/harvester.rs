use crate::browser::PageDriver;
use crate::core::config::HarvestConfig;
use crate::core::pagination::{
    page_url, EndMarker, MissingControlPolicy, NextControl, PaginationStrategy, StopSignal,
};
use crate::core::record::{warn_on_collisions, SetRecord};
use crate::stats::StatsTracker;
use crate::storage::{ErrorLog, ErrorLogEntry, HtmlStorage};
use crate::{HarvestError, HarvestResult};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Saved {
        path: PathBuf,
        pages: usize,
        bytes: usize,
    },
    Failed {
        kind: &'static str,
        error: String,
    },
}

#[derive(Debug, Clone, Default)]
pub struct HarvestReport {
    pub outcomes: Vec<(String, RecordOutcome)>,
}

impl HarvestReport {
    pub fn saved(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, RecordOutcome::Saved { .. }))
            .count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.saved()
    }

    pub fn outcome(&self, name: &str) -> Option<&RecordOutcome> {
        self.outcomes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, o)| o)
    }
}

/// Page markup collected for one set so far.
#[derive(Debug, Default)]
struct ConsolidatedHtml {
    html: String,
    pages: usize,
}

impl ConsolidatedHtml {
    fn push(&mut self, page: &str, limit: Option<usize>) -> HarvestResult<()> {
        if let Some(limit) = limit {
            if self.pages >= limit {
                return Err(HarvestError::PageLimitExceeded { limit });
            }
        }
        self.html.push_str(page);
        self.pages += 1;
        Ok(())
    }

    /// 1-based position of the page about to be collected.
    fn next_position(&self) -> usize {
        self.pages + 1
    }
}

pub struct Harvester {
    config: HarvestConfig,
    storage: HtmlStorage,
    error_log: Option<ErrorLog>,
    stats: Arc<StatsTracker>,
}

impl Harvester {
    /// Validates the configuration and prepares the output folder and error
    /// log. Failures here are fatal for the run.
    pub fn new(config: HarvestConfig) -> HarvestResult<Self> {
        info!("Initializing harvester");
        config.validate()?;

        let storage = HtmlStorage::new(&config.output_dir)?;
        let error_log = config.error_log.as_ref().map(ErrorLog::open).transpose()?;

        Ok(Self {
            config,
            storage,
            error_log,
            stats: Arc::new(StatsTracker::new()),
        })
    }

    pub fn config(&self) -> &HarvestConfig {
        &self.config
    }

    pub fn stats(&self) -> &StatsTracker {
        &self.stats
    }

    /// Harvests every record in order on the given page. A failing record is
    /// logged and skipped; it never stops the batch.
    pub async fn run(&self, driver: &mut dyn PageDriver, records: &[SetRecord]) -> HarvestReport {
        info!(
            "Starting harvest of {} sets ({})",
            records.len(),
            self.config.strategy.name()
        );
        warn_on_collisions(records);

        let mut report = HarvestReport::default();
        for record in records {
            let outcome = self.run_record(driver, record).await;
            report.outcomes.push((record.name.clone(), outcome));
        }

        self.stats.finish();
        info!(
            "All sets processed. Saved: {}, failed: {}",
            report.saved(),
            report.failed()
        );
        report
    }

    /// Runs the batch and closes the driver afterwards, whatever the outcome.
    pub async fn run_and_close<D: PageDriver>(
        &self,
        mut driver: D,
        records: &[SetRecord],
    ) -> HarvestReport {
        let report = self.run(&mut driver, records).await;
        if let Err(e) = driver.close().await {
            warn!("Failed to close browser: {}", e);
        }
        report
    }

    async fn run_record(&self, driver: &mut dyn PageDriver, record: &SetRecord) -> RecordOutcome {
        info!("Fetching: {} ({})", record.name, record.link);
        let start_time = Utc::now();

        let result = match self.collect_pages(driver, record).await {
            Ok(pages) => self.save(record, pages),
            Err(e) => Err(e),
        };
        let duration = Utc::now().signed_duration_since(start_time);

        match result {
            Ok(outcome) => {
                if let RecordOutcome::Saved { pages, bytes, .. } = &outcome {
                    self.stats.record_saved(*pages, *bytes, duration);
                }
                outcome
            }
            Err(e) => {
                self.stats.record_failure(e.kind(), duration);
                self.record_failure(record, &e);
                RecordOutcome::Failed {
                    kind: e.kind(),
                    error: e.to_string(),
                }
            }
        }
    }

    fn save(&self, record: &SetRecord, pages: ConsolidatedHtml) -> HarvestResult<RecordOutcome> {
        let path = self.storage.save(&record.name, &pages.html)?;
        info!(
            "Consolidated HTML saved for {} at {} ({} pages)",
            record.name,
            path.display(),
            pages.pages
        );
        Ok(RecordOutcome::Saved {
            path,
            pages: pages.pages,
            bytes: pages.html.len(),
        })
    }

    fn record_failure(&self, record: &SetRecord, err: &HarvestError) {
        error!("Failed to fetch {}: {}", record.name, err);

        if let Some(log) = &self.error_log {
            let entry = ErrorLogEntry {
                name: record.name.clone(),
                link: record.link.clone(),
                error: err.to_string(),
            };
            if let Err(e) = log.append(entry) {
                warn!(
                    "Could not add {} to error log {}: {}",
                    record.name,
                    log.path().display(),
                    e
                );
            }
        }
    }

    async fn collect_pages(
        &self,
        driver: &mut dyn PageDriver,
        record: &SetRecord,
    ) -> HarvestResult<ConsolidatedHtml> {
        let link = record.url()?;
        match &self.config.strategy {
            PaginationStrategy::SinglePage => self.collect_single(driver, &link).await,
            PaginationStrategy::QueryIncrement { param, start, stop } => {
                self.collect_by_query(driver, &link, param, *start, stop).await
            }
            PaginationStrategy::ClickThrough { control } => {
                self.collect_by_clicking(driver, record, &link, control).await
            }
        }
    }

    async fn collect_single(
        &self,
        driver: &mut dyn PageDriver,
        link: &Url,
    ) -> HarvestResult<ConsolidatedHtml> {
        let mut pages = ConsolidatedHtml::default();
        self.open(driver, link).await?;
        pages.push(&driver.outer_html().await?, self.config.max_pages)?;
        Ok(pages)
    }

    async fn collect_by_query(
        &self,
        driver: &mut dyn PageDriver,
        link: &Url,
        param: &str,
        start: usize,
        stop: &StopSignal,
    ) -> HarvestResult<ConsolidatedHtml> {
        let mut pages = ConsolidatedHtml::default();
        let mut index = start;

        loop {
            let url = page_url(link, param, index);
            info!("Visiting: {}", url);
            self.open(driver, &url).await?;

            match stop {
                StopSignal::NoResults { marker } => {
                    let Some(html) = self.page_unless_marked(driver, marker).await? else {
                        info!("No more results on page {}", index);
                        break;
                    };
                    pages.push(&html, self.config.max_pages)?;
                    info!("Page {} added.", index);
                }
                StopSignal::NextDisabled { control } => {
                    let last = self.is_last_page(driver, control, pages.next_position()).await?;
                    pages.push(&driver.outer_html().await?, self.config.max_pages)?;
                    info!("Page {} added.", index);
                    if last {
                        info!("No more pages after page {}", index);
                        break;
                    }
                }
            }

            index += 1;
        }

        Ok(pages)
    }

    async fn collect_by_clicking(
        &self,
        driver: &mut dyn PageDriver,
        record: &SetRecord,
        link: &Url,
        control: &NextControl,
    ) -> HarvestResult<ConsolidatedHtml> {
        let mut pages = ConsolidatedHtml::default();
        self.open(driver, link).await?;

        loop {
            let position = pages.next_position();
            info!("Processing page {} for {}", position, record.name);
            pages.push(&driver.outer_html().await?, self.config.max_pages)?;

            if self.is_last_page(driver, control, position).await? {
                info!("Reached the last page for {}", record.name);
                break;
            }

            driver
                .click_and_wait(&control.selector, self.config.navigation_timeout())
                .await?;
            self.settle(driver).await?;
        }

        Ok(pages)
    }

    /// The current page's markup, or `None` when it carries the end marker.
    async fn page_unless_marked(
        &self,
        driver: &mut dyn PageDriver,
        marker: &EndMarker,
    ) -> HarvestResult<Option<String>> {
        match marker {
            EndMarker::Selector { selector } => {
                if driver.exists(selector).await? {
                    return Ok(None);
                }
                Ok(Some(driver.outer_html().await?))
            }
            EndMarker::Content { .. } => {
                let html = driver.outer_html().await?;
                if marker.matches_content(&html)? {
                    return Ok(None);
                }
                Ok(Some(html))
            }
        }
    }

    async fn is_last_page(
        &self,
        driver: &mut dyn PageDriver,
        control: &NextControl,
        position: usize,
    ) -> HarvestResult<bool> {
        match driver
            .has_class(&control.selector, &control.disabled_class)
            .await?
        {
            Some(disabled) => Ok(disabled),
            None => match self.config.on_missing_control {
                MissingControlPolicy::Fail => Err(HarvestError::ControlNotFound {
                    selector: control.selector.clone(),
                    page: position,
                }),
                MissingControlPolicy::Finish => {
                    warn!(
                        "\"Next page\" control not found on page {}; treating it as the last page",
                        position
                    );
                    Ok(true)
                }
            },
        }
    }

    async fn open(&self, driver: &mut dyn PageDriver, url: &Url) -> HarvestResult<()> {
        driver.navigate(url, self.config.navigation_timeout()).await?;
        self.settle(driver).await
    }

    async fn settle(&self, driver: &mut dyn PageDriver) -> HarvestResult<()> {
        if let Some(selector) = &self.config.ready_selector {
            debug!("Waiting for {}", selector);
            driver
                .wait_for_selector(selector, self.config.selector_timeout())
                .await?;
        }
        Ok(())
    }
}

/// Harvests `records` with a fresh [`Harvester`] and closes `driver` on every
/// exit path, including a configuration failure.
pub async fn harvest<D: PageDriver>(
    mut driver: D,
    records: &[SetRecord],
    config: HarvestConfig,
) -> HarvestResult<HarvestReport> {
    let harvester = match Harvester::new(config) {
        Ok(harvester) => harvester,
        Err(e) => {
            if let Err(close_err) = driver.close().await {
                warn!("Failed to close browser: {}", close_err);
            }
            return Err(e);
        }
    };

    Ok(harvester.run_and_close(driver, records).await)
}
