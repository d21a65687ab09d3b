use log::debug;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::thread;
use std::time::Duration;

/// 以「能否開啟並讀取一個位元組」判斷檔案是否仍在寫入中
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockProbe {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for LockProbe {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_millis(300),
        }
    }
}

impl LockProbe {
    #[must_use]
    pub fn is_locked(&self, path: &Path) -> bool {
        let attempts = self.attempts.max(1);

        for attempt in 1..=attempts {
            match read_one_byte(path) {
                Ok(()) => return false,
                Err(e) => {
                    debug!(
                        "Lock probe {attempt}/{attempts} failed for {}: {e}",
                        path.display()
                    );
                    if attempt < attempts {
                        thread::sleep(self.backoff);
                    }
                }
            }
        }

        true
    }
}

fn read_one_byte(path: &Path) -> io::Result<()> {
    let mut file = File::open(path)?;
    let mut buf = [0u8; 1];
    // 空檔案讀到 0 個位元組也算可讀
    let _bytes = file.read(&mut buf)?;
    Ok(())
}
