use crate::storage::sanitize_file_name;
use crate::{HarvestError, HarvestResult};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use url::Url;

/// One named listing to harvest. The link is kept as written; it is parsed
/// when its set is harvested, so a bad link only fails that set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetRecord {
    pub name: String,
    pub link: String,
}

impl SetRecord {
    pub fn new(name: impl Into<String>, link: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            link: link.into(),
        }
    }

    pub fn url(&self) -> HarvestResult<Url> {
        Ok(Url::parse(self.link.trim())?)
    }
}

/// Reads the JSON array of `{ name, link }` records. A missing or malformed
/// file is fatal for the run.
pub fn load_records<P: AsRef<Path>>(path: P) -> HarvestResult<Vec<SetRecord>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        HarvestError::ConfigError(format!("cannot read sets file {}: {}", path.display(), e))
    })?;
    let records: Vec<SetRecord> = serde_json::from_str(&content)?;
    info!("Loaded {} sets from {}", records.len(), path.display());
    Ok(records)
}

/// Groups of record names that map onto the same output file. Later records in
/// a group overwrite the earlier ones' output.
pub fn find_name_collisions(records: &[SetRecord]) -> Vec<(String, Vec<String>)> {
    let mut by_file: HashMap<String, Vec<String>> = HashMap::new();
    let mut order = Vec::new();

    for record in records {
        let file = sanitize_file_name(&record.name);
        let names = by_file.entry(file.clone()).or_default();
        if names.is_empty() {
            order.push(file);
        }
        if !names.contains(&record.name) {
            names.push(record.name.clone());
        }
    }

    order
        .into_iter()
        .filter_map(|file| {
            let names = by_file.remove(&file)?;
            (names.len() > 1).then_some((file, names))
        })
        .collect()
}

pub(crate) fn warn_on_collisions(records: &[SetRecord]) {
    for (file, names) in find_name_collisions(records) {
        warn!(
            "Sets {:?} all write to {}.html; only the last one will be kept",
            names, file
        );
    }
    for record in records {
        if sanitize_file_name(&record.name).is_empty() {
            warn!(
                "Set {:?} has no usable file name characters and will fail",
                record.name
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_load_records() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sets.json");
        fs::write(
            &path,
            r#"[
                {"name": "Base Set", "link": "https://example.test/base"},
                {"name": "Jungle", "link": "https://example.test/jungle"}
            ]"#,
        )
        .unwrap();

        let records = load_records(&path).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "Base Set");
        assert_eq!(records[1].link, "https://example.test/jungle");
    }

    #[test]
    fn test_load_records_rejects_malformed_json() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sets.json");
        fs::write(&path, r#"[{"name": "Base Set""#).unwrap();

        assert!(matches!(load_records(&path), Err(HarvestError::JsonError(_))));
    }

    #[test]
    fn test_invalid_link_loads_and_fails_on_use() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sets.json");
        fs::write(
            &path,
            r#"[
                {"name": "Broken", "link": "not a url"},
                {"name": "Base Set", "link": "https://example.test"}
            ]"#,
        )
        .unwrap();

        let records = load_records(&path).unwrap();

        assert!(matches!(records[0].url(), Err(HarvestError::UrlError(_))));
        assert_eq!(records[1].link, "https://example.test");
        assert_eq!(records[1].url().unwrap().as_str(), "https://example.test/");
    }

    #[test]
    fn test_load_records_missing_file_is_config_error() {
        let dir = tempdir().unwrap();
        let result = load_records(dir.path().join("missing.json"));
        assert!(matches!(result, Err(HarvestError::ConfigError(_))));
    }

    #[test]
    fn test_find_name_collisions() {
        let records = vec![
            SetRecord::new("Base Set", "https://example.test/a"),
            SetRecord::new("Jungle", "https://example.test/b"),
            SetRecord::new("Base-Set", "https://example.test/c"),
            SetRecord::new("Base Set!", "https://example.test/d"),
        ];

        let collisions = find_name_collisions(&records);

        assert_eq!(
            collisions,
            vec![(
                "BaseSet".to_string(),
                vec!["Base Set".to_string(), "Base Set!".to_string()]
            )]
        );
    }
}
