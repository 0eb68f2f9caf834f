use anyhow::{anyhow, Context};
use clap::{Parser, ValueEnum};
use log::{info, LevelFilter};
use std::path::PathBuf;
use std::time::Duration;

use setharvest::core::config::HarvestConfig;
use setharvest::core::pagination::{MissingControlPolicy, PaginationStrategy};
use setharvest::core::record::load_records;
use setharvest::{ChromiumDriver, Harvester};

#[derive(Parser)]
#[command(
    name = "setharvest",
    about = "Harvests paginated listings into one consolidated HTML file per set",
    version
)]
struct Cli {
    /// JSON array of `{ "name", "link" }` records.
    #[arg(short, long, default_value = "pokemon_sets.json")]
    sets: PathBuf,

    /// JSON harvest config; flags below override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Folder for the consolidated HTML files.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON file collecting records that failed.
    #[arg(long)]
    error_log: Option<PathBuf>,

    /// Pagination mode; uses the site defaults for that mode.
    #[arg(long, value_enum)]
    mode: Option<Mode>,

    /// Selector awaited after every navigation.
    #[arg(long)]
    ready_selector: Option<String>,

    #[arg(long, value_enum)]
    on_missing_control: Option<OnMissingControl>,

    /// Fail a set that has more pages than this.
    #[arg(long)]
    max_pages: Option<usize>,

    #[arg(long)]
    navigation_timeout: Option<u64>,

    /// Show the browser window.
    #[arg(long)]
    headed: bool,

    /// Skip the automation-hiding launch flags and page scripts.
    #[arg(long)]
    no_stealth: bool,

    /// DevTools endpoint of a running browser (http:// or ws://).
    #[arg(long)]
    remote_url: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum Mode {
    Single,
    Query,
    Click,
}

#[derive(Clone, Copy, ValueEnum)]
enum OnMissingControl {
    Fail,
    Finish,
}

impl Cli {
    fn harvest_config(&self) -> anyhow::Result<HarvestConfig> {
        let mut config = match &self.config {
            Some(path) => HarvestConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => HarvestConfig::default(),
        };

        if let Some(output) = &self.output {
            config = config.with_output_dir(output);
        }
        if let Some(path) = &self.error_log {
            config = config.with_error_log(path);
        }
        if let Some(mode) = self.mode {
            config = config.with_strategy(match mode {
                Mode::Single => PaginationStrategy::SinglePage,
                Mode::Query => PaginationStrategy::query_increment(),
                Mode::Click => PaginationStrategy::click_through(),
            });
        }
        if let Some(selector) = &self.ready_selector {
            config = config.with_ready_selector(selector);
        }
        if let Some(policy) = self.on_missing_control {
            config = config.with_missing_control_policy(match policy {
                OnMissingControl::Fail => MissingControlPolicy::Fail,
                OnMissingControl::Finish => MissingControlPolicy::Finish,
            });
        }
        if let Some(max_pages) = self.max_pages {
            config = config.with_max_pages(max_pages);
        }
        if let Some(secs) = self.navigation_timeout {
            config = config.with_navigation_timeout(Duration::from_secs(secs));
        }
        if self.headed {
            config.browser = config.browser.with_head();
        }
        if self.no_stealth {
            config.browser = config.browser.without_stealth();
        }
        if let Some(url) = &self.remote_url {
            config.browser = config.browser.with_remote_url(url);
        }

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level: LevelFilter = cli
        .log_level
        .parse()
        .map_err(|_| anyhow!("invalid log level `{}`", cli.log_level))?;
    env_logger::builder()
        .filter_level(level)
        .filter_module("chromiumoxide", LevelFilter::Warn)
        .filter_module("tungstenite", LevelFilter::Warn)
        .filter_module("selectors", LevelFilter::Warn)
        .filter_module("html5ever", LevelFilter::Error)
        .init();

    let config = cli.harvest_config()?;
    let records = load_records(&cli.sets)
        .with_context(|| format!("loading sets from {}", cli.sets.display()))?;
    let harvester = Harvester::new(config).context("preparing harvest")?;

    let driver = ChromiumDriver::start(&harvester.config().browser)
        .await
        .context("starting browser")?;
    let report = harvester.run_and_close(driver, &records).await;

    harvester.stats().print_summary();
    info!(
        "Finished: {} saved, {} failed",
        report.saved(),
        report.failed()
    );

    Ok(())
}
