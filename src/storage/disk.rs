use super::base::StorageError;
use log::debug;
use std::fs;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Writes one consolidated HTML document per set into a flat output folder.
#[derive(Debug, Clone)]
pub struct HtmlStorage {
    base_path: PathBuf,
}

impl HtmlStorage {
    /// Creates the output folder (recursively) if it does not exist yet.
    pub fn new<P: AsRef<Path>>(base_path: P) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();
        fs::create_dir_all(&base_path)?;
        Ok(Self { base_path })
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// `<dir>/<sanitized name>.html`, or an error when nothing of the name
    /// survives sanitizing.
    pub fn path_for(&self, name: &str) -> Result<PathBuf, StorageError> {
        let stem = sanitize_file_name(name);
        if stem.is_empty() {
            return Err(StorageError::OperationError(format!(
                "set name {:?} has no usable file name characters",
                name
            )));
        }
        Ok(self.base_path.join(format!("{}.html", stem)))
    }

    /// Saves `html` for the set called `name`, replacing any previous file with
    /// the same sanitized name.
    pub fn save(&self, name: &str, html: &str) -> Result<PathBuf, StorageError> {
        let path = self.path_for(name)?;
        write_atomic(&path, html.as_bytes())?;
        debug!("Wrote {} bytes to {}", html.len(), path.display());
        Ok(path)
    }
}

/// Keeps only `[A-Za-z0-9-_]`.
pub fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
        .collect()
}

/// Writes through a sibling temp file and renames it into place, so readers
/// never observe a half-written file.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), StorageError> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| StorageError::OperationError(format!("invalid path {}", path.display())))?;
    let tmp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::now_v7()));

    fs::write(&tmp_path, contents)?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_sanitize_strips_disallowed_characters() {
        assert_eq!(sanitize_file_name("Base Set"), "BaseSet");
        assert_eq!(sanitize_file_name("Sword & Shield: Promo"), "SwordShieldPromo");
        assert_eq!(sanitize_file_name("Team_Rocket-Returns"), "Team_Rocket-Returns");
        assert_eq!(sanitize_file_name("Pokémon GO"), "PokmonGO");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "etcpasswd");
    }

    #[test]
    fn test_path_for_only_contains_allowed_characters() {
        let dir = tempdir().unwrap();
        let storage = HtmlStorage::new(dir.path()).unwrap();

        for name in ["Base Set", "XY—Evolutions", "Sun/Moon (Promo) #1"] {
            let path = storage.path_for(name).unwrap();
            let file_name = path.file_name().unwrap().to_str().unwrap();
            assert!(file_name.ends_with(".html"));
            let stem = file_name.trim_end_matches(".html");
            assert!(stem
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
        }
    }

    #[test]
    fn test_name_without_usable_characters_is_rejected() {
        let dir = tempdir().unwrap();
        let storage = HtmlStorage::new(dir.path()).unwrap();

        for name in ["", "  ", "!!!", "ポケモン"] {
            assert!(matches!(
                storage.save(name, "<html></html>"),
                Err(StorageError::OperationError(_))
            ));
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_new_creates_nested_output_folder() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b").join("html_files");

        let storage = HtmlStorage::new(&nested).unwrap();

        assert!(nested.is_dir());
        assert_eq!(storage.base_path(), nested.as_path());
    }

    #[test]
    fn test_save_overwrites_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let storage = HtmlStorage::new(dir.path()).unwrap();

        storage.save("Base Set", "<html>old</html>").unwrap();
        let path = storage.save("Base Set", "<html>new</html>").unwrap();

        assert_eq!(path, dir.path().join("BaseSet.html"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "<html>new</html>");

        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_colliding_names_share_a_file() {
        let dir = tempdir().unwrap();
        let storage = HtmlStorage::new(dir.path()).unwrap();

        let first = storage.save("Base Set", "first").unwrap();
        let second = storage.save("Base Set!", "second").unwrap();

        assert_eq!(first, second);
        assert_eq!(fs::read_to_string(first).unwrap(), "second");
    }
}
