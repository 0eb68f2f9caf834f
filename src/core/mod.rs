pub mod config;
pub mod pagination;
pub mod record;

mod errors;
mod harvester;

pub use config::{BrowserOptions, HarvestConfig};
pub use errors::{HarvestError, HarvestResult};
pub use harvester::{harvest, HarvestReport, Harvester, RecordOutcome};
pub use pagination::{EndMarker, MissingControlPolicy, NextControl, PaginationStrategy, StopSignal};
pub use record::{load_records, SetRecord};
