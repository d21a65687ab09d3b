use crate::tools::ensure_directory_exists;
use anyhow::{Context, Result};
use chrono::{DateTime, Local, TimeZone};
use std::fmt::Display;
use std::path::{Path, PathBuf};

const BATCH_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// 批次資料夾名稱：`{prefix}_{YYYYMMDD_HHMMSS}`
#[must_use]
pub fn batch_folder_name<Tz>(prefix: &str, time: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!("{prefix}_{}", time.format(BATCH_TIMESTAMP_FORMAT))
}

/// 在目的地底下建立本次的批次資料夾
///
/// 同一秒內重複呼叫會得到同一個資料夾，已存在不視為錯誤。
pub fn allocate_batch_folder(dest_base: &Path, prefix: &str) -> Result<PathBuf> {
    let batch_path = dest_base.join(batch_folder_name(prefix, &Local::now()));

    ensure_directory_exists(&batch_path)
        .with_context(|| format!("Failed to create batch folder {}", batch_path.display()))?;

    Ok(batch_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_batch_folder_name_format() {
        let time = Local.with_ymd_and_hms(2024, 3, 7, 9, 5, 2).unwrap();
        assert_eq!(batch_folder_name("Session", &time), "Session_20240307_090502");
    }

    #[test]
    fn test_allocate_creates_missing_parents() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("Generated/Photos");

        let batch = allocate_batch_folder(&dest, "Session").unwrap();

        assert!(batch.is_dir());
        assert!(batch.starts_with(&dest));
        let name = batch.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("Session_"));
        assert_eq!(name.len(), "Session_".len() + 15);
    }

    #[test]
    fn test_allocate_tolerates_existing_folder() {
        let temp_dir = TempDir::new().unwrap();

        let first = allocate_batch_folder(temp_dir.path(), "Import").unwrap();
        fs::write(first.join("keep.jpg"), "x").unwrap();
        let second = allocate_batch_folder(temp_dir.path(), "Import").unwrap();

        assert!(second.is_dir());
        assert!(first.join("keep.jpg").exists());
    }

    #[test]
    fn test_allocate_fails_when_base_is_a_file() {
        let temp_dir = TempDir::new().unwrap();
        let blocker = temp_dir.path().join("blocker");
        fs::write(&blocker, "x").unwrap();

        assert!(allocate_batch_folder(&blocker, "Session").is_err());
    }
}
