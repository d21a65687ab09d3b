use anyhow::Result;
use console::{Term, style};
use log::{info, warn};
use session_organizer::config::{Config, DEFAULT_SETTINGS_FILE};
use session_organizer::init;
use session_organizer::menu::show_main_menu;
use session_organizer::signal::setup_shutdown_signal;
use std::path::PathBuf;
use std::sync::atomic::Ordering;

fn main() -> Result<()> {
    let settings_path = std::env::args_os()
        .nth(1)
        .map_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE), PathBuf::from);

    let mut config = Config::load_or_default(&settings_path)?;
    init::init(config.silent_mode);
    info!("Using settings file {}", settings_path.display());

    let term = Term::stdout();
    let shutdown_signal = setup_shutdown_signal()?;

    loop {
        match show_main_menu(&term, &shutdown_signal, &mut config, &settings_path) {
            Ok(true) if !shutdown_signal.load(Ordering::SeqCst) => {}
            Ok(_) => {
                println!("\n{}", style("Goodbye!").green().bold());
                info!("Program exited normally");
                break;
            }
            Err(e) => {
                warn!("Program error: {e:#}");
                eprintln!("{} {e:#}", style("Error:").red().bold());
                break;
            }
        }
    }

    Ok(())
}
