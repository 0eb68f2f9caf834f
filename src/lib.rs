pub mod browser;
pub mod core;
pub mod stats;
pub mod storage;

pub use browser::{ChromiumDriver, MockDriver, PageDriver};
pub use self::core::{harvest, HarvestConfig, HarvestReport, Harvester, RecordOutcome};
pub use self::core::{HarvestError, HarvestResult, SetRecord};
pub use stats::StatsTracker;
pub use storage::{ErrorLog, HtmlStorage};
