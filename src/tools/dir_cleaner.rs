use log::{debug, info, warn};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// 由下往上移除空的子資料夾，來源根目錄本身保留
pub fn remove_empty_subdirectories(root: &Path) -> usize {
    let mut removed = 0;

    let walker = WalkDir::new(root)
        .min_depth(1)
        .contents_first(true)
        .follow_links(false);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry under {}: {e}", root.display());
                continue;
            }
        };

        if !entry.file_type().is_dir() {
            continue;
        }

        let path = entry.path();
        let is_empty = fs::read_dir(path).is_ok_and(|mut entries| entries.next().is_none());
        if !is_empty {
            continue;
        }

        match fs::remove_dir(path) {
            Ok(()) => {
                removed += 1;
                let relative = path.strip_prefix(root).unwrap_or(path);
                info!("Removed empty directory: {}", relative.display());
            }
            Err(e) => debug!("Could not remove {}: {e}", path.display()),
        }
    }

    removed
}
