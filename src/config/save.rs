use crate::config::types::Config;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = serde_json::to_string_pretty(config).context("Failed to serialize settings")?;

    fs::write(path, content)
        .with_context(|| format!("Failed to write settings to {}", path.display()))?;

    Ok(())
}

/// 新增來源資料夾，已存在時不重複加入
pub fn add_source_folder(config: &mut Config, path: &str) -> bool {
    let path = PathBuf::from(path.trim());
    if path.as_os_str().is_empty() || config.source_folders.contains(&path) {
        return false;
    }
    config.source_folders.push(path);
    true
}

pub fn remove_source_folder(config: &mut Config, index: usize) -> Option<PathBuf> {
    (index < config.source_folders.len()).then(|| config.source_folders.remove(index))
}
