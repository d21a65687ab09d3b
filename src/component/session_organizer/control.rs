use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

/// 暫停、停止與長時間等待的輪詢間隔
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Scanning,
    Waiting,
    Verifying,
    Moving,
    Cooldown,
    Paused,
    Stopped,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Waiting => "waiting",
            Self::Verifying => "verifying",
            Self::Moving => "moving",
            Self::Cooldown => "cooldown",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
struct ControlFlags {
    stop: Arc<AtomicBool>,
    paused: AtomicBool,
    state: Mutex<CycleState>,
}

/// 前端與循環控制器之間共用的控制旗標
///
/// 停止與暫停都是協作式的：控制器只在狀態轉換之間與等待中輪詢，
/// 不會在搬移檔案途中被打斷。
#[derive(Debug, Clone)]
pub struct CycleControl {
    flags: Arc<ControlFlags>,
}

impl Default for CycleControl {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleControl {
    #[must_use]
    pub fn new() -> Self {
        Self::with_stop_signal(Arc::new(AtomicBool::new(false)))
    }

    /// 使用外部的停止旗標（例如 Ctrl-C 訊號）
    #[must_use]
    pub fn with_stop_signal(stop: Arc<AtomicBool>) -> Self {
        Self {
            flags: Arc::new(ControlFlags {
                stop,
                paused: AtomicBool::new(false),
                state: Mutex::new(CycleState::Idle),
            }),
        }
    }

    pub fn stop(&self) {
        self.flags.stop.store(true, Ordering::SeqCst);
    }

    pub fn pause(&self) {
        self.flags.paused.store(true, Ordering::SeqCst);
    }

    pub fn resume(&self) {
        self.flags.paused.store(false, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.flags.stop.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.flags.paused.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn state(&self) -> CycleState {
        *self
            .flags
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn set_state(&self, state: CycleState) {
        *self
            .flags
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = state;
    }
}
