use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PathError {
    #[error("path does not exist: {}", .0.display())]
    Missing(PathBuf),
    #[error("path is not a directory: {}", .0.display())]
    NotDirectory(PathBuf),
    #[error("cannot create directory {}: {source}", path.display())]
    CreateFailed {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub fn validate_directory_exists(path: &Path) -> Result<(), PathError> {
    if !path.exists() {
        return Err(PathError::Missing(path.to_path_buf()));
    }
    if !path.is_dir() {
        return Err(PathError::NotDirectory(path.to_path_buf()));
    }
    Ok(())
}

/// 建立資料夾（含上層），已存在視為成功
pub fn ensure_directory_exists(path: &Path) -> Result<(), PathError> {
    std::fs::create_dir_all(path).map_err(|source| PathError::CreateFailed {
        path: path.to_path_buf(),
        source,
    })
}
