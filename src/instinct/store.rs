//! Instinct file store
//!
//! One record per `{id}.md` file under the data root:
//!
//! ```text
//! DATA_DIR/
//! ├── instincts/
//! │   ├── personal/      # learned from this environment's observations
//! │   ├── inherited/     # imported from files or URLs
//! │   └── archived/      # pruned, kept for recovery
//! └── observations.jsonl
//! ```
//!
//! Pruned records are archived, never deleted.

use anyhow::{Context, Result};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::record::Instinct;

/// Storage category for an instinct file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Personal,
    Inherited,
    Archived,
}

impl Category {
    fn dir_name(&self) -> &'static str {
        match self {
            Category::Personal => "personal",
            Category::Inherited => "inherited",
            Category::Archived => "archived",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.dir_name())
    }
}

/// File-backed instinct storage rooted at a data directory.
pub struct InstinctStore {
    data_dir: PathBuf,
}

impl InstinctStore {
    /// Open the store at the default data directory.
    pub fn new() -> Result<Self> {
        Self::with_dir(crate::config::data_dir()?)
    }

    /// Open the store at a custom data directory.
    pub fn with_dir(data_dir: PathBuf) -> Result<Self> {
        let store = Self { data_dir };
        for category in [Category::Personal, Category::Inherited, Category::Archived] {
            std::fs::create_dir_all(store.category_dir(category))
                .context("Failed to create instinct directory")?;
        }
        Ok(store)
    }

    /// The data root this store operates on.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Directory holding one category of instinct files.
    pub fn category_dir(&self, category: Category) -> PathBuf {
        self.data_dir.join("instincts").join(category.dir_name())
    }

    /// Path of the observation log consumed by the analyzer.
    pub fn observations_path(&self) -> PathBuf {
        self.data_dir.join("observations.jsonl")
    }

    /// Load all instincts from the personal and inherited directories.
    ///
    /// Records are tagged with their source file and category. Files that
    /// fail to parse are skipped with a warning; the rest still load.
    pub fn load_all(&self) -> Result<Vec<Instinct>> {
        let mut instincts = Vec::new();

        for category in [Category::Personal, Category::Inherited] {
            let dir = self.category_dir(category);
            if !dir.exists() {
                continue;
            }

            let mut paths: Vec<PathBuf> = std::fs::read_dir(&dir)
                .with_context(|| format!("Failed to read {}", dir.display()))?
                .filter_map(|entry| entry.ok())
                .map(|entry| entry.path())
                .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("md"))
                .collect();
            paths.sort();

            for path in paths {
                let content = match std::fs::read_to_string(&path) {
                    Ok(content) => content,
                    Err(e) => {
                        warn!("Failed to read {}: {}", path.display(), e);
                        continue;
                    }
                };
                match Instinct::from_markdown(&content) {
                    Some(mut instinct) => {
                        // Stored scores outside the valid band are clamped,
                        // not rejected
                        instinct.confidence = instinct.confidence.clamp(0.0, 1.0);
                        instinct.source_file = Some(path.clone());
                        instinct.source_category = Some(category);
                        instincts.push(instinct);
                    }
                    None => warn!("Skipping unparsable instinct file {}", path.display()),
                }
            }
        }

        Ok(instincts)
    }

    /// Write an instinct into a category directory as `{id}.md`.
    pub fn save(&self, instinct: &Instinct, category: Category) -> Result<PathBuf> {
        let path = self.category_dir(category).join(format!("{}.md", instinct.id));
        std::fs::write(&path, instinct.to_markdown())
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!("Saved instinct {} to {}", instinct.id, path.display());
        Ok(path)
    }

    /// Move an instinct's file into the archived directory.
    ///
    /// Name collisions in the archive get a timestamp suffix.
    pub fn archive(&self, instinct: &Instinct) -> Result<PathBuf> {
        let source = instinct
            .source_file
            .clone()
            .with_context(|| format!("Instinct {} has no source file to archive", instinct.id))?;

        let archived_dir = self.category_dir(Category::Archived);
        let file_name = source
            .file_name()
            .context("Source file has no name")?
            .to_string_lossy()
            .into_owned();

        let mut destination = archived_dir.join(&file_name);
        if destination.exists() {
            let stem = source
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| instinct.id.clone());
            let stamp = Local::now().format("%Y%m%d-%H%M%S");
            destination = archived_dir.join(format!("{}-{}.md", stem, stamp));
        }

        std::fs::rename(&source, &destination)
            .with_context(|| format!("Failed to archive {}", source.display()))?;
        debug!("Archived {} to {}", instinct.id, destination.display());
        Ok(destination)
    }

    /// Number of lines in the observation log, if it exists.
    pub fn observation_count(&self) -> usize {
        let path = self.observations_path();
        match std::fs::read_to_string(&path) {
            Ok(content) => content.lines().filter(|l| !l.trim().is_empty()).count(),
            Err(_) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instinct::record::InstinctSource;

    fn store() -> (tempfile::TempDir, InstinctStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = InstinctStore::with_dir(dir.path().to_path_buf()).unwrap();
        (dir, store)
    }

    fn instinct(id: &str, domain: &str, confidence: f64) -> Instinct {
        Instinct::new(
            id.to_string(),
            format!("when working on {}", domain),
            confidence,
            domain.to_string(),
        )
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let (_dir, store) = store();

        store.save(&instinct("test-first", "testing", 0.8), Category::Personal).unwrap();
        store.save(&instinct("commit-often", "git", 0.6), Category::Inherited).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 2);

        let personal = loaded.iter().find(|i| i.id == "test-first").unwrap();
        assert_eq!(personal.source_category, Some(Category::Personal));
        assert!(personal.source_file.is_some());

        let inherited = loaded.iter().find(|i| i.id == "commit-often").unwrap();
        assert_eq!(inherited.source_category, Some(Category::Inherited));
    }

    #[test]
    fn test_load_all_skips_unparsable_files() {
        let (_dir, store) = store();
        store.save(&instinct("good", "testing", 0.7), Category::Personal).unwrap();
        std::fs::write(store.category_dir(Category::Personal).join("bad.md"), "not a record").unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, "good");
    }

    #[test]
    fn test_archived_records_not_loaded() {
        let (_dir, store) = store();
        store.save(&instinct("old", "git", 0.4), Category::Archived).unwrap();
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_archive_moves_file() {
        let (_dir, store) = store();
        store.save(&instinct("stale", "workflow", 0.3), Category::Personal).unwrap();

        let loaded = store.load_all().unwrap();
        let destination = store.archive(&loaded[0]).unwrap();

        assert!(destination.exists());
        assert!(destination.starts_with(store.category_dir(Category::Archived)));
        assert!(store.load_all().unwrap().is_empty());
    }

    #[test]
    fn test_archive_handles_name_collision() {
        let (_dir, store) = store();
        store.save(&instinct("dup", "git", 0.4), Category::Personal).unwrap();
        std::fs::write(store.category_dir(Category::Archived).join("dup.md"), "occupied").unwrap();

        let loaded = store.load_all().unwrap();
        let destination = store.archive(&loaded[0]).unwrap();
        assert!(destination.exists());
        assert_ne!(
            destination,
            store.category_dir(Category::Archived).join("dup.md")
        );
    }

    #[test]
    fn test_observation_count() {
        let (_dir, store) = store();
        assert_eq!(store.observation_count(), 0);
        std::fs::write(store.observations_path(), "{\"tool\":\"Read\"}\n{\"tool\":\"Edit\"}\n").unwrap();
        assert_eq!(store.observation_count(), 2);
    }

    #[test]
    fn test_source_preserved_through_store() {
        let (_dir, store) = store();
        let mut record = instinct("shared", "testing", 0.7);
        record.source = InstinctSource::Inherited;
        store.save(&record, Category::Inherited).unwrap();

        let loaded = store.load_all().unwrap();
        assert_eq!(loaded[0].source, InstinctSource::Inherited);
    }
}
