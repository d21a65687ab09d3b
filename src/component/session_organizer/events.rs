use super::control::CycleState;
use log::{Level, log};
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// 提供給前端顯示的進度訊息
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    StateChanged(CycleState),
    ScanCompleted { total: usize, sources: usize },
    NothingToDo,
    WaitingForStability { total: usize, delay: Duration },
    CountChanged { before: usize, after: usize },
    MembershipChanged { total: usize },
    Stable { total: usize },
    BatchCreated { name: String },
    FileMoved { source: PathBuf, destination: PathBuf },
    MoveFailed { source: PathBuf, reason: String },
    BatchComplete { moved: usize, attempted: usize },
    DirectoriesRemoved { count: usize },
    CooldownStarted { duration: Duration },
    Error(String),
    Paused,
    Resumed,
    Stopped,
}

impl ProgressEvent {
    #[must_use]
    pub const fn level(&self) -> Level {
        match self {
            Self::StateChanged(_) | Self::FileMoved { .. } | Self::NothingToDo => Level::Debug,
            Self::MoveFailed { .. } | Self::Error(_) => Level::Error,
            Self::BatchComplete { moved, attempted } if *moved < *attempted => Level::Warn,
            _ => Level::Info,
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::StateChanged(state) => write!(f, "State: {state}"),
            Self::ScanCompleted { total, sources } => {
                write!(f, "Scanned {sources} source folders: {total} files detected")
            }
            Self::NothingToDo => write!(f, "No files to move"),
            Self::WaitingForStability { total, delay } => write!(
                f,
                "Detected {total} files, waiting {}s before verifying",
                delay.as_secs()
            ),
            Self::CountChanged { before, after } => {
                write!(f, "File count changed ({before} -> {after}), skipping this round")
            }
            Self::MembershipChanged { total } => {
                write!(f, "File set changed ({total} files), skipping this round")
            }
            Self::Stable { total } => write!(f, "File count verified: {total} files stable"),
            Self::BatchCreated { name } => write!(f, "Created batch: {name}"),
            Self::FileMoved {
                source,
                destination,
            } => write!(f, "Moved {} -> {}", source.display(), destination.display()),
            Self::MoveFailed { source, reason } => {
                write!(f, "Failed to move {}: {reason}", source.display())
            }
            Self::BatchComplete { moved, attempted } => {
                write!(f, "Batch complete: {moved}/{attempted} files moved")
            }
            Self::DirectoriesRemoved { count } => write!(f, "Removed {count} empty directories"),
            Self::CooldownStarted { duration } => {
                write!(f, "Cooldown: waiting {}s before next scan", duration.as_secs())
            }
            Self::Error(message) => write!(f, "Error: {message}"),
            Self::Paused => write!(f, "Paused"),
            Self::Resumed => write!(f, "Resumed"),
            Self::Stopped => write!(f, "Organizer stopped"),
        }
    }
}

/// 多訂閱者的進度事件通道，斷線的訂閱者會被自動移除
#[derive(Debug, Clone, Default)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<Sender<ProgressEvent>>>>,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    pub fn emit(&self, event: ProgressEvent) {
        log!(event.level(), "{event}");

        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_receives_events() {
        let bus = EventBus::new();
        let first = bus.subscribe();
        let second = bus.subscribe();

        bus.emit(ProgressEvent::Stable { total: 2 });

        assert_eq!(first.try_recv().unwrap(), ProgressEvent::Stable { total: 2 });
        assert_eq!(second.try_recv().unwrap(), ProgressEvent::Stable { total: 2 });
    }

    #[test]
    fn test_dropped_subscriber_is_removed() {
        let bus = EventBus::new();
        let kept = bus.subscribe();
        drop(bus.subscribe());

        bus.emit(ProgressEvent::Paused);
        bus.emit(ProgressEvent::Resumed);

        assert_eq!(kept.try_iter().count(), 2);
        assert_eq!(bus.subscribers.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_display_lines() {
        assert_eq!(
            ProgressEvent::BatchComplete {
                moved: 3,
                attempted: 4
            }
            .to_string(),
            "Batch complete: 3/4 files moved"
        );
        assert_eq!(
            ProgressEvent::CountChanged {
                before: 2,
                after: 5
            }
            .to_string(),
            "File count changed (2 -> 5), skipping this round"
        );
    }

    #[test]
    fn test_partial_batch_is_a_warning() {
        let partial = ProgressEvent::BatchComplete {
            moved: 1,
            attempted: 2,
        };
        let full = ProgressEvent::BatchComplete {
            moved: 2,
            attempted: 2,
        };
        assert_eq!(partial.level(), Level::Warn);
        assert_eq!(full.level(), Level::Info);
    }
}
