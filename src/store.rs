//! Record file persistence
//!
//! The record file is replaced atomically: the new content goes to a
//! temporary sibling which is renamed over the target once fully written, so
//! readers always see a complete file. An advisory lock next to the file keeps
//! two ingestion runs from interleaving.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;
use serde::Serialize;

use crate::record::{RecordSet, ThemeRecord};

/// JSON file holding the canonical record set
pub struct ThemeStore {
    path: PathBuf,
}

impl ThemeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Load the record set. Records are re-sorted and deduplicated on the way in.
    pub fn load(&self) -> Result<RecordSet> {
        let content = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {:?}", self.path))?;
        let records: Vec<ThemeRecord> = serde_json::from_str(&content)
            .with_context(|| format!("Invalid theme file {:?}", self.path))?;
        Ok(RecordSet::from_records(records))
    }

    /// Load the record set, treating a missing file as empty
    pub fn load_or_empty(&self) -> Result<RecordSet> {
        if !self.path.exists() {
            tracing::warn!("No theme file at {:?}, starting empty", self.path);
            return Ok(RecordSet::default());
        }
        self.load()
    }

    /// Replace the file with `records`
    pub fn save(&self, records: &RecordSet) -> Result<()> {
        let lock = self.lock()?;
        let result = write_json_atomic(&self.path, records.records());
        if let Err(e) = FileExt::unlock(&lock) {
            tracing::warn!("Failed to release lock for {:?}: {}", self.path, e);
        }
        result?;
        tracing::debug!("Wrote {} records to {:?}", records.len(), self.path);
        Ok(())
    }

    fn lock(&self) -> Result<File> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let lock_path = sibling(&self.path, "lock");
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {:?}", lock_path))?;
        lock.lock_exclusive()
            .with_context(|| format!("Failed to lock {:?}", lock_path))?;
        Ok(lock)
    }
}

/// Pretty-print `value` to `path` through a temporary file and a rename
pub fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let tmp_path = sibling(path, &format!("tmp.{}", std::process::id()));
    let written = (|| -> Result<()> {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    })();

    if let Err(e) = written.and_then(|_| fs::rename(&tmp_path, path).map_err(Into::into)) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e).with_context(|| format!("Failed to write {:?}", path));
    }
    Ok(())
}

/// `themes.json` -> `themes.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!("{}.{}", name, suffix))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calendar::CalendarDate;

    fn record(date: &str, theme: &str) -> ThemeRecord {
        ThemeRecord::new(CalendarDate::parse_iso(date).unwrap(), theme)
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThemeStore::new(dir.path().join("public").join("themes.json"));
        let set = RecordSet::from_records(vec![
            record("2025-09-08", "Trains"),
            record("2025-09-01", "Cover art"),
        ]);

        store.save(&set).unwrap();
        assert_eq!(store.load().unwrap(), set);

        // no temporary file left behind
        let leftovers: Vec<_> = fs::read_dir(store.path().parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().contains(".tmp."))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_save_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThemeStore::new(dir.path().join("themes.json"));
        store.save(&RecordSet::from_records(vec![record("2025-09-01", "Cover art")])).unwrap();

        let lock = File::open(sibling(store.path(), "lock")).unwrap();
        lock.try_lock_exclusive().unwrap();
        FileExt::unlock(&lock).unwrap();
    }

    #[test]
    fn test_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThemeStore::new(dir.path().join("themes.json"));
        store.save(&RecordSet::from_records(vec![record("2025-09-01", "Cover art")])).unwrap();

        let content = fs::read_to_string(store.path()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&content).unwrap();
        assert_eq!(value, serde_json::json!([{ "date": "2025-09-01", "theme": "Cover art" }]));
        assert!(content.contains("\n  {"));
    }

    #[test]
    fn test_save_replaces_previous_set() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThemeStore::new(dir.path().join("themes.json"));
        store.save(&RecordSet::from_records(vec![record("2025-09-01", "Old")])).unwrap();
        store.save(&RecordSet::from_records(vec![record("2025-09-08", "New")])).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.records()[0].theme, "New");
    }

    #[test]
    fn test_load_normalizes_unsorted_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("themes.json");
        fs::write(
            &path,
            r#"[{"date":"2025-09-08","theme":"B"},{"date":"2025-09-01","theme":"A"},{"date":"2025-09-08","theme":"C"}]"#,
        )
        .unwrap();

        let loaded = ThemeStore::new(&path).load().unwrap();
        let themes: Vec<&str> = loaded.records().iter().map(|r| r.theme.as_str()).collect();
        assert_eq!(themes, vec!["A", "C"]);
    }

    #[test]
    fn test_missing_and_invalid_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = ThemeStore::new(dir.path().join("missing.json"));
        assert!(store.load().is_err());
        assert!(store.load_or_empty().unwrap().is_empty());

        let bad = dir.path().join("bad.json");
        fs::write(&bad, r#"[{"date":"next monday","theme":"X"}]"#).unwrap();
        assert!(ThemeStore::new(bad).load().is_err());
    }
}
