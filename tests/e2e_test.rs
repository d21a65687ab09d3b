//! E2E Integration Tests
//!
//! 以暫存資料夾驗證整理器完整的偵測→驗證→移動流程

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use session_organizer::component::Organizer;
use session_organizer::component::session_organizer::{
    BatchReport, CycleOutcome, CycleState, ProgressEvent,
};
use session_organizer::config::{Config, SharedConfig, StabilityMode};
use session_organizer::tools::{Ledger, Relocator};
use tempfile::TempDir;

struct Workspace {
    _temp_dir: TempDir,
    root: PathBuf,
    source: PathBuf,
    dest: PathBuf,
    state_file: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().to_path_buf();
        let source = root.join("card");
        fs::create_dir_all(&source).unwrap();
        Self {
            source,
            dest: root.join("library"),
            state_file: root.join("state.json"),
            root,
            _temp_dir: temp_dir,
        }
    }

    fn config(&self) -> Config {
        Config {
            source_folders: vec![self.source.clone()],
            dest_base_folder: self.dest.clone(),
            state_file: self.state_file.clone(),
            detection_delay_seconds: 0,
            cooldown_seconds: 0,
            idle_wait_seconds: 0,
            error_backoff_seconds: 0,
            lock_probe_attempts: 1,
            lock_probe_backoff_millis: 0,
            ..Config::default()
        }
    }

    fn organizer(&self, config: Config) -> Organizer {
        Organizer::new(SharedConfig::new(config))
    }

    /// 先寫到來源外面再改名進來，避免掃描看到寫到一半的檔案
    fn drop_file(&self, relative: &str, content: &str) {
        let target = self.source.join(relative);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        let staging = self.root.join(format!("staging-{}", relative.replace('/', "_")));
        fs::write(&staging, content).unwrap();
        fs::rename(&staging, &target).unwrap();
    }

    fn batch_folders(&self) -> Vec<PathBuf> {
        if !self.dest.exists() {
            return Vec::new();
        }
        let mut folders: Vec<PathBuf> = fs::read_dir(&self.dest)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .filter(|path| path.is_dir())
            .collect();
        folders.sort();
        folders
    }
}

/// 只複製不刪除，模擬「回報成功但原檔仍在」
struct CopyOnlyRelocator;

impl Relocator for CopyOnlyRelocator {
    fn relocate(&self, source: &Path, destination: &Path) -> Result<()> {
        fs::copy(source, destination)?;
        Ok(())
    }
}

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

/// 測試 1: 穩定的檔案被移到同一個批次資料夾並寫入紀錄
#[test]
fn test_stable_files_are_moved_into_one_batch() {
    let ws = Workspace::new();
    ws.drop_file("a.jpg", "photo a");
    ws.drop_file("b.jpg", "photo b");
    ws.drop_file("notes.txt", "not a photo");

    let mut organizer = ws.organizer(ws.config());
    organizer.startup_checks().unwrap();

    let CycleOutcome::Moved(report) = organizer.run_cycle().unwrap() else {
        panic!("expected a batch to be moved");
    };
    assert_eq!((report.moved, report.attempted), (2, 2));
    assert_eq!(report.removed_directories, 0);

    assert_eq!(ws.batch_folders(), vec![report.batch_folder.clone()]);
    let name = report.batch_folder.file_name().unwrap().to_string_lossy();
    assert!(name.starts_with("Session_"));

    assert_eq!(
        fs::read_to_string(report.batch_folder.join("a.jpg")).unwrap(),
        "photo a"
    );
    assert_eq!(
        fs::read_to_string(report.batch_folder.join("b.jpg")).unwrap(),
        "photo b"
    );
    assert!(!ws.source.join("a.jpg").exists());
    assert!(!ws.source.join("b.jpg").exists());
    assert!(ws.source.join("notes.txt").exists());

    assert!(organizer.ledger().contains(&ws.source.join("a.jpg")));
    assert!(organizer.ledger().contains(&ws.source.join("b.jpg")));
    let on_disk = Ledger::load(&ws.state_file);
    assert_eq!(on_disk.len(), 2);
}

/// 測試 2: 等待期間檔案數量改變，本輪不移動任何檔案
#[test]
fn test_count_change_during_wait_skips_cycle() {
    let ws = Workspace::new();
    ws.drop_file("a.jpg", "x");

    let mut config = ws.config();
    config.detection_delay_seconds = 1;
    let mut organizer = ws.organizer(config);

    let late_source = ws.source.clone();
    let staging = ws.root.join("late.jpg");
    let writer = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        fs::write(&staging, "late").unwrap();
        fs::rename(&staging, late_source.join("late.jpg")).unwrap();
    });

    let outcome = organizer.run_cycle().unwrap();
    writer.join().unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Unstable {
            detected: 1,
            rescanned: 2
        }
    );
    assert!(ws.source.join("a.jpg").exists());
    assert!(ws.source.join("late.jpg").exists());
    assert!(ws.batch_folders().is_empty());
    assert!(organizer.ledger().is_empty());
}

/// 測試 3: Identity 模式下，數量相同但檔案被替換也視為不穩定
#[test]
fn test_identity_mode_detects_replacement() {
    let ws = Workspace::new();
    ws.drop_file("a.jpg", "x");

    let mut config = ws.config();
    config.detection_delay_seconds = 1;
    config.stability_mode = StabilityMode::Identity;
    let mut organizer = ws.organizer(config);

    let source = ws.source.clone();
    let swapper = thread::spawn(move || {
        thread::sleep(Duration::from_millis(300));
        fs::rename(source.join("a.jpg"), source.join("b.jpg")).unwrap();
    });

    let outcome = organizer.run_cycle().unwrap();
    swapper.join().unwrap();

    assert_eq!(
        outcome,
        CycleOutcome::Unstable {
            detected: 1,
            rescanned: 1
        }
    );
    assert!(ws.source.join("b.jpg").exists());
    assert!(organizer.ledger().is_empty());
}

/// 測試 4: 搬移後原檔仍存在時不算成功，也不寫入紀錄
#[test]
fn test_unverified_move_is_not_recorded() {
    let ws = Workspace::new();
    ws.drop_file("a.jpg", "x");

    let mut organizer = ws.organizer(ws.config()).with_relocator(CopyOnlyRelocator);

    let outcome = organizer.run_cycle().unwrap();
    assert!(matches!(
        outcome,
        CycleOutcome::Moved(BatchReport {
            moved: 0,
            attempted: 1,
            ..
        })
    ));
    assert!(ws.source.join("a.jpg").exists());
    assert!(organizer.ledger().is_empty());
    assert_eq!(organizer.scan_all_sources().total(), 1);
}

/// 測試 5: 遞迴掃描搭配自動清理，移除空的子資料夾但保留來源根目錄
#[test]
fn test_recursive_cycle_with_cleanup() {
    let ws = Workspace::new();
    ws.drop_file("DCIM/a.jpg", "x");
    ws.drop_file("top.mov", "x");

    let mut config = ws.config();
    config.recursive_scan = true;
    config.auto_cleanup_empty_dirs = true;
    let mut organizer = ws.organizer(config);

    let CycleOutcome::Moved(report) = organizer.run_cycle().unwrap() else {
        panic!("expected a batch to be moved");
    };
    assert_eq!(report.moved, 2);
    assert_eq!(report.removed_directories, 1);
    assert!(ws.source.is_dir());
    assert!(!ws.source.join("DCIM").exists());
    assert!(report.batch_folder.join("a.jpg").exists());
    assert!(report.batch_folder.join("top.mov").exists());
}

/// 測試 6: 立即匯出不等待，並一律清理空資料夾
#[test]
fn test_export_session() {
    let ws = Workspace::new();
    ws.drop_file("nested/a.jpg", "x");
    ws.drop_file("b.png", "x");

    let mut config = ws.config();
    config.recursive_scan = true;
    config.detection_delay_seconds = 60;
    let mut organizer = ws.organizer(config);
    organizer.startup_checks().unwrap();

    let (moved, attempted, batch) = organizer.export_session().unwrap();
    assert_eq!((moved, attempted), (2, 2));
    let batch = batch.unwrap();
    assert!(batch.join("a.jpg").exists());
    assert!(batch.join("b.png").exists());
    assert!(!ws.source.join("nested").exists());

    let (moved, attempted, batch) = organizer.export_session().unwrap();
    assert_eq!((moved, attempted, batch), (0, 0, None));
    assert_eq!(ws.batch_folders().len(), 1);
}

/// 測試 7: 背景執行時可以暫停、繼續與停止
#[test]
fn test_background_pause_resume_stop() {
    let ws = Workspace::new();
    let organizer = ws.organizer(ws.config());
    let handle = organizer.spawn().unwrap();
    let events = handle.subscribe();

    handle.pause();
    let paused = wait_until(Duration::from_secs(5), || handle.state() == CycleState::Paused);
    assert!(paused);

    ws.drop_file("a.jpg", "x");
    thread::sleep(Duration::from_millis(300));
    assert!(ws.source.join("a.jpg").exists());

    handle.resume();
    let moved = wait_until(Duration::from_secs(10), || !ws.source.join("a.jpg").exists());
    assert!(moved);

    handle.stop();
    let organizer = handle.join().unwrap();
    assert_eq!(organizer.control().state(), CycleState::Stopped);
    let batches = ws.batch_folders();
    assert_eq!(batches.len(), 1);
    assert!(batches[0].join("a.jpg").exists());

    let received: Vec<ProgressEvent> = events.try_iter().collect();
    assert!(received.contains(&ProgressEvent::Paused));
    assert!(received.contains(&ProgressEvent::Resumed));
    assert_eq!(received.last(), Some(&ProgressEvent::Stopped));
}

/// 測試 8: 循環中的錯誤只會被回報，整理器持續執行直到停止
#[test]
fn test_errors_do_not_stop_the_loop() {
    let ws = Workspace::new();
    ws.drop_file("a.jpg", "x");
    fs::write(&ws.dest, "a file where the destination should be").unwrap();

    let organizer = ws.organizer(ws.config());
    let events = organizer.subscribe();
    let handle = organizer.spawn().unwrap();

    let mut errors = 0;
    let deadline = Instant::now() + Duration::from_secs(10);
    while errors < 2 && Instant::now() < deadline {
        if let Ok(ProgressEvent::Error(_)) = events.recv_timeout(Duration::from_millis(100)) {
            errors += 1;
        }
    }
    assert_eq!(errors, 2);
    assert!(!handle.is_finished());

    handle.stop();
    let organizer = handle.join().unwrap();
    assert!(ws.source.join("a.jpg").exists());
    assert!(organizer.ledger().is_empty());
}

/// 測試 9: 等待偵測延遲期間收到停止訊號，立即結束而不是等滿延遲
#[test]
fn test_stop_interrupts_detection_delay() {
    let ws = Workspace::new();
    ws.drop_file("a.jpg", "x");

    let mut config = ws.config();
    config.detection_delay_seconds = 60;
    let handle = ws.organizer(config).spawn().unwrap();

    let waiting = wait_until(Duration::from_secs(5), || handle.state() == CycleState::Waiting);
    assert!(waiting);

    let started = Instant::now();
    handle.stop();
    let organizer = handle.join().unwrap();

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(organizer.control().state(), CycleState::Stopped);
    assert!(ws.source.join("a.jpg").exists());
    assert!(ws.batch_folders().is_empty());
}

/// 測試 10: 在等待階段暫停後繼續，從原本的位置接著驗證，不會重新掃描
#[test]
fn test_resume_continues_where_it_paused() {
    let ws = Workspace::new();
    ws.drop_file("a.jpg", "x");

    let mut config = ws.config();
    config.detection_delay_seconds = 2;
    let organizer = ws.organizer(config);
    let events = organizer.subscribe();
    let handle = organizer.spawn().unwrap();

    let waiting = wait_until(Duration::from_secs(5), || handle.state() == CycleState::Waiting);
    assert!(waiting);
    handle.pause();
    let paused = wait_until(Duration::from_secs(5), || handle.state() == CycleState::Paused);
    assert!(paused);

    thread::sleep(Duration::from_millis(300));
    handle.resume();

    let mut received = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if let Ok(event) = events.recv_timeout(Duration::from_millis(100)) {
            let stable = matches!(event, ProgressEvent::Stable { .. });
            received.push(event);
            if stable {
                break;
            }
        }
    }

    handle.stop();
    handle.join().unwrap();

    let resumed_at = received
        .iter()
        .position(|e| *e == ProgressEvent::Resumed)
        .unwrap();
    assert_eq!(
        received[resumed_at..],
        [
            ProgressEvent::Resumed,
            ProgressEvent::StateChanged(CycleState::Verifying),
            ProgressEvent::Stable { total: 1 },
        ]
    );
    assert_eq!(
        received
            .iter()
            .filter(|e| **e == ProgressEvent::StateChanged(CycleState::Scanning))
            .count(),
        1
    );
}
