//! 監看來源資料夾的批次整理元件
//!
//! 偵測來源資料夾中的新檔案，等待一段時間後重新掃描確認檔案數量穩定，
//! 再整批移到以時間戳記命名的資料夾

mod control;
mod events;
mod main;
mod stability;

pub use control::{CycleControl, CycleState, POLL_INTERVAL};
pub use events::{EventBus, ProgressEvent};
pub use main::{BatchReport, CycleOutcome, Organizer, OrganizerHandle, StartupError};
pub use stability::{Verification, verify};
