use crate::component::session_organizer::{
    CycleControl, CycleState, POLL_INTERVAL, ProgressEvent, StartupError,
};
use crate::component::{Organizer, OrganizerHandle};
use crate::config::{Config, SharedConfig};
use crate::pause;
use anyhow::Result;
use console::{Term, style};
use indicatif::{ProgressBar, ProgressStyle};
use log::{Level, info, warn};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// 開始監看：顯示即時進度，`p` 暫停、`r` 繼續，`q` 或 Ctrl-C 停止
pub fn run_watch(term: &Term, shutdown_signal: &Arc<AtomicBool>, config: &Config) -> Result<()> {
    let control = CycleControl::new();
    let mut organizer =
        Organizer::new(SharedConfig::new(config.clone())).with_control(control.clone());

    if let Err(errors) = organizer.startup_checks() {
        print_startup_errors(&errors);
        pause(term)?;
        return Ok(());
    }

    term.clear_screen()?;
    println!("{}", style("=== Watching ===").cyan().bold());
    println!("{}", style("p: pause   r: resume   q: stop   Ctrl-C: stop").dim());

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(CycleState::Idle.to_string());

    let printer = spawn_printer(organizer.subscribe(), spinner.clone());
    let bridge = spawn_signal_bridge(Arc::clone(shutdown_signal), control.clone());
    let handle = organizer.spawn()?;

    wait_for_keys(term, &control);

    finish(handle, &control)?;
    if printer.join().is_err() {
        warn!("Progress printer thread panicked");
    }
    if bridge.join().is_err() {
        warn!("Signal bridge thread panicked");
    }
    spinner.finish_and_clear();

    println!("{}", style("Watching stopped").green());
    if !shutdown_signal.load(Ordering::SeqCst) {
        pause(term)?;
    }
    Ok(())
}

/// 不等待穩定，立即把目前所有符合條件的檔案移到新批次
pub fn run_export_session(term: &Term, config: &Config) -> Result<()> {
    let mut organizer = Organizer::new(SharedConfig::new(config.clone()));

    if let Err(errors) = organizer.startup_checks() {
        print_startup_errors(&errors);
        pause(term)?;
        return Ok(());
    }

    match organizer.export_session() {
        Ok((moved, attempted, Some(batch_folder))) => {
            let summary = format!("Exported {moved}/{attempted} files");
            if moved < attempted {
                println!("{}", style(summary).yellow().bold());
            } else {
                println!("{}", style(summary).green().bold());
            }
            println!("  -> {}", batch_folder.display());
        }
        Ok((_, _, None)) => println!("{}", style("No files to export").dim()),
        Err(e) => eprintln!("{} {e:#}", style("Error:").red().bold()),
    }

    pause(term)?;
    Ok(())
}

fn print_startup_errors(errors: &[StartupError]) {
    eprintln!("{}", style("Cannot start:").red().bold());
    for e in errors {
        eprintln!("  {} {e}", style("✗").red());
    }
}

/// 將進度事件印在 spinner 上方，狀態變更只更新 spinner 訊息
fn spawn_printer(events: Receiver<ProgressEvent>, spinner: ProgressBar) -> JoinHandle<()> {
    thread::spawn(move || {
        for event in events {
            match &event {
                ProgressEvent::StateChanged(state) => spinner.set_message(state.to_string()),
                ProgressEvent::Paused => {
                    spinner.set_message("paused (press p to resume)");
                    spinner.println(style(event.to_string()).yellow().to_string());
                }
                ProgressEvent::Resumed => {
                    spinner.set_message("running");
                    spinner.println(event.to_string());
                }
                _ => {
                    let line = event.to_string();
                    let line = match event.level() {
                        Level::Error => style(line).red().to_string(),
                        Level::Warn => style(line).yellow().to_string(),
                        Level::Debug | Level::Trace => style(line).dim().to_string(),
                        Level::Info => line,
                    };
                    spinner.println(line);
                }
            }
        }
    })
}

/// Ctrl-C 只停止這次監看；監看結束後執行緒也跟著結束
fn spawn_signal_bridge(shutdown_signal: Arc<AtomicBool>, control: CycleControl) -> JoinHandle<()> {
    thread::spawn(move || {
        while !control.is_stopped() {
            if shutdown_signal.load(Ordering::SeqCst) {
                control.stop();
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }
    })
}

fn wait_for_keys(term: &Term, control: &CycleControl) {
    loop {
        match term.read_char() {
            Ok('p' | 'P') => {
                if control.is_paused() {
                    control.resume();
                } else {
                    control.pause();
                }
            }
            Ok('r' | 'R') => control.resume(),
            // raw mode 下 Ctrl-C 會以錯誤回傳
            Ok('q' | 'Q' | '\u{3}') | Err(_) => break,
            Ok(_) => {}
        }

        if control.is_stopped() {
            break;
        }
    }
}

fn finish(handle: OrganizerHandle, control: &CycleControl) -> Result<()> {
    control.resume();
    handle.stop();
    let organizer = handle.join()?;
    info!("Watching ended with {} ledger entries", organizer.ledger().len());
    Ok(())
}
