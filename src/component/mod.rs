//! 功能元件模組
//!
//! 目前只有監看來源資料夾並批次整理的元件

pub mod session_organizer;

pub use session_organizer::{Organizer, OrganizerHandle};
