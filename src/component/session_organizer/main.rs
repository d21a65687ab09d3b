use super::control::{CycleControl, CycleState, POLL_INTERVAL};
use super::events::{EventBus, ProgressEvent};
use super::stability::{Verification, verify};
use crate::config::{Config, ConfigError, SharedConfig};
use crate::tools::{
    EligibilityFilter, FileMover, FsRelocator, Ledger, MoveResult, PathError, Relocator,
    ScanResult, allocate_batch_folder, ensure_directory_exists, remove_empty_subdirectories,
    validate_directory_exists,
};
use anyhow::{Context, Result, anyhow};
use log::{error, info};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("source folder invalid: {0}")]
    Source(#[source] PathError),
    #[error("cannot create destination folder: {0}")]
    Destination(#[source] PathError),
}

/// 一次成功移動的批次摘要
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchReport {
    pub batch_folder: PathBuf,
    pub moved: usize,
    pub attempted: usize,
    pub removed_directories: usize,
}

/// 單一循環（偵測→驗證→移動）的結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 沒有可移動的檔案
    Idle,
    /// 兩次掃描不一致，本輪放棄
    Unstable { detected: usize, rescanned: usize },
    Moved(BatchReport),
    Stopped,
}

enum Phase {
    Scanning,
    IdleWait,
    Waiting(ScanResult),
    Verifying(ScanResult),
    Moving(ScanResult),
    Cooldown,
}

/// 下一個狀態，以及本輪結束時的結果
type Step = (Phase, Option<CycleOutcome>);

/// 監看來源資料夾並將穩定的檔案批次移到時間戳記資料夾
///
/// 單一執行緒的狀態機：
/// `SCANNING → WAITING → VERIFYING → MOVING → COOLDOWN → SCANNING`，
/// 沒有檔案時進入短暫的 `IDLE` 等待。每個狀態轉換前都會檢查暫停與停止。
pub struct Organizer {
    config: SharedConfig,
    cycle_config: Config,
    ledger: Ledger,
    relocator: Box<dyn Relocator>,
    control: CycleControl,
    events: EventBus,
}

impl Organizer {
    #[must_use]
    pub fn new(config: SharedConfig) -> Self {
        let cycle_config = config.snapshot();
        let ledger = Ledger::load(&cycle_config.state_file);

        Self {
            config,
            cycle_config,
            ledger,
            relocator: Box::new(FsRelocator),
            control: CycleControl::new(),
            events: EventBus::new(),
        }
    }

    #[must_use]
    pub fn with_relocator(mut self, relocator: impl Relocator + 'static) -> Self {
        self.relocator = Box::new(relocator);
        self
    }

    #[must_use]
    pub fn with_control(mut self, control: CycleControl) -> Self {
        self.control = control;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &SharedConfig {
        &self.config
    }

    #[must_use]
    pub const fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    #[must_use]
    pub const fn control(&self) -> &CycleControl {
        &self.control
    }

    #[must_use]
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// 啟動前檢查：設定、來源資料夾、目的地，最後清理過期紀錄
    ///
    /// 任一項失敗都不會留下部分結果（目的地不會被建立，紀錄不會被修改）。
    pub fn startup_checks(&mut self) -> Result<(), Vec<StartupError>> {
        self.refresh_cycle_config();
        let config = &self.cycle_config;

        let mut errors: Vec<StartupError> = match config.validate() {
            Ok(()) => Vec::new(),
            Err(config_errors) => config_errors.into_iter().map(StartupError::from).collect(),
        };

        for source_folder in &config.source_folders {
            if let Err(e) = validate_directory_exists(source_folder) {
                errors.push(StartupError::Source(e));
            }
        }

        if !errors.is_empty() {
            for e in &errors {
                error!("{e}");
            }
            return Err(errors);
        }

        if let Err(e) = ensure_directory_exists(&config.dest_base_folder) {
            error!("Cannot create destination folder: {e}");
            return Err(vec![StartupError::Destination(e)]);
        }

        self.ledger.prune();
        info!(
            "Startup checks passed: {} source folders, destination {}",
            config.source_folders.len(),
            config.dest_base_folder.display()
        );
        Ok(())
    }

    /// 以本輪設定快照掃描所有來源資料夾
    #[must_use]
    pub fn scan_all_sources(&self) -> ScanResult {
        EligibilityFilter::new(&self.cycle_config, &self.ledger).scan_all_sources()
    }

    pub fn create_batch_folder(&self) -> Result<PathBuf> {
        allocate_batch_folder(
            &self.cycle_config.dest_base_folder,
            &self.cycle_config.batch_folder_prefix,
        )
    }

    pub fn move_all_files(&mut self, scan: &ScanResult, batch_folder: &Path) -> MoveResult {
        let result = FileMover::new(&mut self.ledger, self.relocator.as_ref())
            .move_candidates(scan.candidates(), batch_folder);

        if !self.cycle_config.silent_mode {
            for (source, destination) in &result.moves {
                self.events.emit(ProgressEvent::FileMoved {
                    source: source.clone(),
                    destination: destination.clone(),
                });
            }
        }
        for (source, reason) in &result.failures {
            self.events.emit(ProgressEvent::MoveFailed {
                source: source.clone(),
                reason: reason.clone(),
            });
        }

        result
    }

    /// 移除所有來源資料夾中的空子資料夾，來源根目錄保留
    pub fn cleanup_all_sources(&self) -> usize {
        let removed: usize = self
            .cycle_config
            .source_folders
            .iter()
            .filter(|source| source.is_dir())
            .map(|source| remove_empty_subdirectories(source))
            .sum();

        if removed > 0 {
            self.events
                .emit(ProgressEvent::DirectoriesRemoved { count: removed });
        }
        removed
    }

    /// 立即移動所有符合條件的檔案，不等待也不驗證，完成後一律清理空資料夾
    ///
    /// 回傳 `(moved, attempted, batch_folder)`；沒有檔案時不建立批次資料夾。
    pub fn export_session(&mut self) -> Result<(usize, usize, Option<PathBuf>)> {
        self.refresh_cycle_config();

        let scan = self.scan_and_report();
        if scan.is_empty() {
            self.events.emit(ProgressEvent::NothingToDo);
            return Ok((0, 0, None));
        }

        let report = self.move_batch(&scan, true)?;
        Ok((report.moved, report.attempted, Some(report.batch_folder)))
    }

    /// 執行一輪偵測→驗證→移動（不含冷卻），回傳本輪結果
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        let mut phase = Phase::Scanning;

        loop {
            if !self.checkpoint() {
                return Ok(CycleOutcome::Stopped);
            }

            let (next, outcome) = self.advance(phase)?;
            if let Some(outcome) = outcome {
                return Ok(outcome);
            }
            phase = next;
        }
    }

    /// 持續循環直到收到停止訊號
    ///
    /// 任何狀態中的錯誤（包含 panic）都只會被記錄，
    /// 短暫等待後回到 SCANNING。
    pub fn run(&mut self) {
        info!("Organizer started");
        let mut phase = Phase::Scanning;

        while self.checkpoint() {
            let step = panic::catch_unwind(AssertUnwindSafe(|| self.advance(phase)));

            phase = match step {
                Ok(Ok((next, _))) => next,
                Ok(Err(e)) => self.recover(&format!("{e:#}")),
                Err(payload) => self.recover(&panic_message(payload.as_ref())),
            };
        }

        self.control.set_state(CycleState::Stopped);
        self.events.emit(ProgressEvent::Stopped);
    }

    /// 在背景執行緒啟動 [`Organizer::run`]
    pub fn spawn(self) -> Result<OrganizerHandle> {
        let control = self.control.clone();
        let events = self.events.clone();

        let thread = thread::Builder::new()
            .name("session-organizer".to_string())
            .spawn(move || {
                let mut organizer = self;
                organizer.run();
                organizer
            })
            .context("Failed to spawn organizer thread")?;

        Ok(OrganizerHandle {
            control,
            events,
            thread,
        })
    }

    fn advance(&mut self, phase: Phase) -> Result<Step> {
        match phase {
            Phase::Scanning => {
                self.enter(CycleState::Scanning);
                self.refresh_cycle_config();
                self.ledger.prune();

                let detected = self.scan_and_report();
                if detected.is_empty() {
                    self.events.emit(ProgressEvent::NothingToDo);
                    return Ok((Phase::IdleWait, Some(CycleOutcome::Idle)));
                }

                self.events.emit(ProgressEvent::WaitingForStability {
                    total: detected.total(),
                    delay: self.cycle_config.detection_delay(),
                });
                Ok((Phase::Waiting(detected), None))
            }
            Phase::IdleWait => {
                self.enter(CycleState::Idle);
                self.interruptible_sleep(self.cycle_config.idle_wait());
                Ok((Phase::Scanning, None))
            }
            Phase::Waiting(detected) => {
                self.enter(CycleState::Waiting);
                if self.interruptible_sleep(self.cycle_config.detection_delay()) {
                    Ok((Phase::Verifying(detected), None))
                } else {
                    Ok((Phase::Scanning, None))
                }
            }
            Phase::Verifying(detected) => {
                self.enter(CycleState::Verifying);
                let rescan = self.scan_all_sources();
                let rescanned = rescan.total();

                let outcome = match verify(&detected, rescan, self.cycle_config.stability_mode) {
                    Verification::Stable(stable) => {
                        self.events.emit(ProgressEvent::Stable {
                            total: stable.total(),
                        });
                        return Ok((Phase::Moving(stable), None));
                    }
                    Verification::CountChanged { before, after } => {
                        self.events
                            .emit(ProgressEvent::CountChanged { before, after });
                        CycleOutcome::Unstable {
                            detected: before,
                            rescanned: after,
                        }
                    }
                    Verification::MembershipChanged { total } => {
                        self.events
                            .emit(ProgressEvent::MembershipChanged { total });
                        CycleOutcome::Unstable {
                            detected: detected.total(),
                            rescanned,
                        }
                    }
                    Verification::Empty => {
                        self.events.emit(ProgressEvent::NothingToDo);
                        CycleOutcome::Idle
                    }
                };
                Ok((Phase::Scanning, Some(outcome)))
            }
            Phase::Moving(stable) => {
                self.enter(CycleState::Moving);
                let report = self.move_batch(&stable, self.cycle_config.auto_cleanup_empty_dirs)?;
                Ok((Phase::Cooldown, Some(CycleOutcome::Moved(report))))
            }
            Phase::Cooldown => {
                self.enter(CycleState::Cooldown);
                self.events.emit(ProgressEvent::CooldownStarted {
                    duration: self.cycle_config.cooldown(),
                });
                self.interruptible_sleep(self.cycle_config.cooldown());
                Ok((Phase::Scanning, None))
            }
        }
    }

    fn scan_and_report(&self) -> ScanResult {
        let scan = self.scan_all_sources();
        self.events.emit(ProgressEvent::ScanCompleted {
            total: scan.total(),
            sources: scan.sources().len(),
        });
        scan
    }

    /// 建立批次資料夾並搬移整批檔案，`cleanup` 時接著清理空的子資料夾
    fn move_batch(&mut self, scan: &ScanResult, cleanup: bool) -> Result<BatchReport> {
        let batch_folder = self.create_batch_folder()?;
        self.events.emit(ProgressEvent::BatchCreated {
            name: batch_name(&batch_folder),
        });

        let result = self.move_all_files(scan, &batch_folder);
        self.events.emit(ProgressEvent::BatchComplete {
            moved: result.moved,
            attempted: result.attempted,
        });

        let removed_directories = if cleanup {
            self.cleanup_all_sources()
        } else {
            0
        };

        Ok(BatchReport {
            batch_folder,
            moved: result.moved,
            attempted: result.attempted,
            removed_directories,
        })
    }

    /// 每輪開始時重新取得設定快照；狀態檔路徑變更時重新載入紀錄
    fn refresh_cycle_config(&mut self) {
        self.cycle_config = self.config.snapshot();
        if self.ledger.path() != self.cycle_config.state_file.as_path() {
            self.ledger = Ledger::load(&self.cycle_config.state_file);
        }
    }

    fn recover(&self, message: &str) -> Phase {
        self.events.emit(ProgressEvent::Error(message.to_string()));
        self.interruptible_sleep(self.cycle_config.error_backoff());
        Phase::Scanning
    }

    fn enter(&self, state: CycleState) {
        self.control.set_state(state);
        self.events.emit(ProgressEvent::StateChanged(state));
    }

    /// 暫停時原地等待直到恢復；收到停止訊號時回傳 false
    fn checkpoint(&self) -> bool {
        if self.control.is_stopped() {
            return false;
        }
        if !self.control.is_paused() {
            return true;
        }

        let previous = self.control.state();
        self.control.set_state(CycleState::Paused);
        self.events.emit(ProgressEvent::Paused);

        while self.control.is_paused() {
            if self.control.is_stopped() {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }

        self.control.set_state(previous);
        self.events.emit(ProgressEvent::Resumed);
        !self.control.is_stopped()
    }

    /// 以小段輪詢的方式等待；暫停期間不計時，停止時提早回傳 false
    fn interruptible_sleep(&self, duration: Duration) -> bool {
        let mut remaining = duration;

        while !remaining.is_zero() {
            if !self.checkpoint() {
                return false;
            }
            let step = remaining.min(POLL_INTERVAL);
            thread::sleep(step);
            remaining = remaining.saturating_sub(step);
        }

        !self.control.is_stopped()
    }
}

/// 背景執行中的整理器
pub struct OrganizerHandle {
    control: CycleControl,
    events: EventBus,
    thread: JoinHandle<Organizer>,
}

impl OrganizerHandle {
    pub fn pause(&self) {
        self.control.pause();
    }

    pub fn resume(&self) {
        self.control.resume();
    }

    pub fn stop(&self) {
        self.control.stop();
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.control.is_paused()
    }

    #[must_use]
    pub fn state(&self) -> CycleState {
        self.control.state()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    #[must_use]
    pub fn subscribe(&self) -> Receiver<ProgressEvent> {
        self.events.subscribe()
    }

    /// 等待背景執行緒結束並取回整理器；需先呼叫 [`OrganizerHandle::stop`]
    pub fn join(self) -> Result<Organizer> {
        self.thread.join().map_err(|payload| {
            anyhow!(
                "Organizer thread panicked: {}",
                panic_message(payload.as_ref())
            )
        })
    }
}

fn batch_name(batch_folder: &Path) -> String {
    batch_folder.file_name().map_or_else(
        || batch_folder.display().to_string(),
        |name| name.to_string_lossy().into_owned(),
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
