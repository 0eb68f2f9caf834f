use chrono::{DateTime, Duration, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
pub struct HarvestStats {
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub total_sets: usize,
    pub saved_sets: usize,
    pub failed_sets: usize,
    pub pages_collected: usize,
    pub bytes_written: usize,
    pub failure_reasons: HashMap<String, usize>,
    pub average_set_time: f64, // in milliseconds
}

#[derive(Debug, Clone)]
pub struct StatsTracker {
    stats: Arc<RwLock<HarvestStats>>,
}

impl StatsTracker {
    pub fn new() -> Self {
        Self {
            stats: Arc::new(RwLock::new(HarvestStats {
                start_time: Utc::now(),
                end_time: None,
                total_sets: 0,
                saved_sets: 0,
                failed_sets: 0,
                pages_collected: 0,
                bytes_written: 0,
                failure_reasons: HashMap::new(),
                average_set_time: 0.0,
            })),
        }
    }

    pub fn record_saved(&self, pages: usize, bytes: usize, duration: Duration) {
        let mut stats = self.stats.write();
        stats.saved_sets += 1;
        stats.pages_collected += pages;
        stats.bytes_written += bytes;
        Self::record_set(&mut stats, duration);
    }

    pub fn record_failure(&self, reason: &str, duration: Duration) {
        let mut stats = self.stats.write();
        stats.failed_sets += 1;
        *stats.failure_reasons.entry(reason.to_string()).or_insert(0) += 1;
        Self::record_set(&mut stats, duration);
    }

    fn record_set(stats: &mut HarvestStats, duration: Duration) {
        stats.total_sets += 1;

        let current_total = stats.average_set_time * (stats.total_sets - 1) as f64;
        let new_duration = duration.num_milliseconds() as f64;
        stats.average_set_time = (current_total + new_duration) / stats.total_sets as f64;
    }

    pub fn finish(&self) {
        self.stats.write().end_time = Some(Utc::now());
    }

    pub fn get_stats(&self) -> HarvestStats {
        self.stats.read().clone()
    }

    pub fn print_summary(&self) {
        let stats = self.stats.read();
        let duration = stats
            .end_time
            .unwrap_or_else(Utc::now)
            .signed_duration_since(stats.start_time);

        println!("\nHarvest Statistics:");
        println!("===================");
        println!("Duration: {} seconds", duration.num_seconds());
        println!("Sets Processed: {}", stats.total_sets);
        println!("Sets Saved: {}", stats.saved_sets);
        println!("Sets Failed: {}", stats.failed_sets);
        println!("Pages Collected: {}", stats.pages_collected);
        println!(
            "Data Written: {:.2} MB",
            stats.bytes_written as f64 / 1_000_000.0
        );
        println!("Average Time per Set: {:.2}ms", stats.average_set_time);

        if !stats.failure_reasons.is_empty() {
            println!("\nFailure Reasons:");
            for (reason, count) in &stats.failure_reasons {
                println!("  {}: {}", reason, count);
            }
        }
    }
}

impl Default for StatsTracker {
    fn default() -> Self {
        Self::new()
    }
}
