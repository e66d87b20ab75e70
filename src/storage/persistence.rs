//! Whole-file JSON snapshots with atomic replacement.

use std::fs;
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::core::{Result, StoreError, Submission};

/// JSON array of submissions on disk.
///
/// Saves go to a temporary file in the same directory which is then renamed
/// over the target, so readers of the raw file only ever see a complete
/// snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Reads the snapshot. `None` means the file is missing or blank.
    pub async fn load(&self) -> Result<Option<Vec<Submission>>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(StoreError::io(&self.path, err)),
        };

        if text.trim().is_empty() {
            return Ok(None);
        }

        let records = serde_json::from_str::<Vec<Submission>>(&text).map_err(|source| {
            StoreError::Corrupt {
                path: self.path.clone(),
                source,
            }
        })?;

        Ok(Some(records))
    }

    /// Atomically replaces the file with `records`, in the given order.
    pub async fn save(&self, records: Vec<Submission>) -> Result<()> {
        let path = self.path.clone();
        tokio::task::spawn_blocking(move || write_atomic(&path, &records)).await?
    }
}

fn write_atomic(path: &Path, records: &[Submission]) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|err| StoreError::io(&dir, err))?;

    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "snapshot".to_string());
    let prefix = format!(".{file_name}.");

    // Dropping `tmp` on any early return deletes the temporary file.
    let mut tmp = tempfile::Builder::new()
        .prefix(&prefix)
        .suffix(".tmp")
        .tempfile_in(&dir)
        .map_err(|err| StoreError::io(&dir, err))?;
    let tmp_path = tmp.path().to_path_buf();

    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        serde_json::to_writer_pretty(&mut writer, records)?;
        writer
            .flush()
            .map_err(|err| StoreError::io(&tmp_path, err))?;
    }
    tmp.as_file()
        .sync_all()
        .map_err(|err| StoreError::io(&tmp_path, err))?;

    // rename(2) replaces an existing target atomically and moves into place otherwise.
    tmp.persist(path)
        .map_err(|err| StoreError::io(path, err.error))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn leftover_temp_files(dir: &Path) -> usize {
        fs::read_dir(dir)
            .unwrap()
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count()
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let snapshot = SnapshotFile::new(temp_dir.path().join("submissions.json"));

        let records = vec![
            Submission::new("Contact", r#"{"a":1}"#),
            Submission::new("Order", r#"{"b":"two"}"#),
        ];
        snapshot.save(records.clone()).await.unwrap();

        assert!(snapshot.exists());
        let loaded = snapshot.load().await.unwrap().unwrap();
        assert_eq!(loaded, records);
        assert_eq!(leftover_temp_files(temp_dir.path()), 0);
    }

    #[tokio::test]
    async fn test_empty_snapshot_is_bracket_pair() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("submissions.json");
        SnapshotFile::new(&path).save(Vec::new()).await.unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "[]");
    }

    #[tokio::test]
    async fn test_missing_and_blank_files_load_as_none() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("submissions.json");
        let snapshot = SnapshotFile::new(&path);
        assert!(snapshot.load().await.unwrap().is_none());

        fs::write(&path, "  \n").unwrap();
        assert!(snapshot.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("submissions.json");
        fs::write(&path, "[{\"Id\": ").unwrap();

        let err = SnapshotFile::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn test_creates_missing_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("data").join("submissions.json");
        SnapshotFile::new(&path).save(Vec::new()).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_failed_replace_cleans_up_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        // A non-empty directory cannot be replaced by a file.
        let path = temp_dir.path().join("submissions.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "x").unwrap();

        let err = SnapshotFile::new(&path)
            .save(vec![Submission::new("A", "{}")])
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::Io { .. }));
        assert!(path.join("keep").exists());
        assert_eq!(leftover_temp_files(temp_dir.path()), 0);
    }
}
