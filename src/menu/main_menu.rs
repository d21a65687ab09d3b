use crate::config::Config;
use crate::config::save::{add_source_folder, remove_source_folder, save_config};
use crate::menu::handlers::{run_export_session, run_watch};
use anyhow::Result;
use console::{Term, style};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

pub fn show_main_menu(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &mut Config,
    settings_path: &Path,
) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style("=== Session Organizer ===").cyan().bold());
    print_config_summary(config);
    println!("{}", style("(ESC to exit)").dim());

    let options = vec![
        "Start watching",
        "Export session now",
        "Settings",
        "Exit",
    ];

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Choose an action")
        .items(&options)
        .default(0)
        .interact_on_opt(term)?;

    match selection {
        Some(0) => {
            run_watch(term, shutdown_signal, config)?;
            Ok(true)
        }
        Some(1) => {
            run_export_session(term, config)?;
            Ok(true)
        }
        Some(2) => {
            show_settings_menu(term, config, settings_path)?;
            Ok(true)
        }
        Some(3) | None => Ok(false),
        _ => unreachable!(),
    }
}

fn print_config_summary(config: &Config) {
    println!(
        "Monitoring {} source folders:",
        style(config.source_folders.len()).green()
    );
    for folder in &config.source_folders {
        println!("  {} {}", style("•").dim(), folder.display());
    }
    println!("Output: {}", config.dest_base_folder.display());
    println!(
        "Detection wait: {}s, cooldown: {}s, mode: {}",
        config.detection_delay_seconds,
        config.cooldown_seconds,
        if config.silent_mode { "silent" } else { "verbose" }
    );
    println!();
}

/// 設定選單
fn show_settings_menu(term: &Term, config: &mut Config, settings_path: &Path) -> Result<()> {
    loop {
        term.clear_screen()?;

        println!("{}", style("=== Settings ===").cyan().bold());
        println!("{}", style("(ESC to go back)").dim());

        let options = vec![
            format!("Source folders ({})", config.source_folders.len()),
            format!("Destination: {}", config.dest_base_folder.display()),
            format!("Batch prefix: {}", config.batch_folder_prefix),
            format!("Detection delay: {}s", config.detection_delay_seconds),
            format!("Cooldown: {}s", config.cooldown_seconds),
            format!("Recursive scan: {}", on_off(config.recursive_scan)),
            format!("Skip hidden files: {}", on_off(config.skip_hidden_files)),
            format!(
                "Remove empty subfolders after move: {}",
                on_off(config.auto_cleanup_empty_dirs)
            ),
            format!("Silent mode: {}", on_off(config.silent_mode)),
            "Back".to_string(),
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Select a setting")
            .items(&options)
            .default(0)
            .interact_on_opt(term)?;

        let changed = match selection {
            Some(0) => show_source_folders_menu(term, config)?,
            Some(1) => {
                let path: String = Input::new()
                    .with_prompt("Destination base folder")
                    .with_initial_text(config.dest_base_folder.display().to_string())
                    .interact_text()?;
                config.dest_base_folder = PathBuf::from(path.trim());
                true
            }
            Some(2) => {
                let prefix: String = Input::new()
                    .with_prompt("Batch folder prefix")
                    .default(config.batch_folder_prefix.clone())
                    .interact_text()?;
                config.batch_folder_prefix = prefix.trim().to_string();
                true
            }
            Some(3) => {
                config.detection_delay_seconds = Input::new()
                    .with_prompt("Detection delay (seconds)")
                    .default(config.detection_delay_seconds)
                    .interact_text()?;
                true
            }
            Some(4) => {
                config.cooldown_seconds = Input::new()
                    .with_prompt("Cooldown (seconds)")
                    .default(config.cooldown_seconds)
                    .interact_text()?;
                true
            }
            Some(5) => toggle(&mut config.recursive_scan, "Scan subfolders recursively?")?,
            Some(6) => toggle(&mut config.skip_hidden_files, "Skip hidden files?")?,
            Some(7) => toggle(
                &mut config.auto_cleanup_empty_dirs,
                "Remove empty subfolders after each move?",
            )?,
            Some(8) => toggle(&mut config.silent_mode, "Silent mode?")?,
            Some(9) | None => break,
            _ => unreachable!(),
        };

        if changed {
            save_config(config, settings_path)?;
            println!("\n{}", style("Settings saved").green());
            std::thread::sleep(std::time::Duration::from_secs(1));
        }
    }

    Ok(())
}

/// 來源資料夾清單：選擇既有項目即移除，或新增一個
fn show_source_folders_menu(term: &Term, config: &mut Config) -> Result<bool> {
    term.clear_screen()?;

    println!("{}", style("=== Source folders ===").cyan().bold());
    println!("{}", style("(select a folder to remove it)").dim());

    let mut options: Vec<String> = config
        .source_folders
        .iter()
        .enumerate()
        .map(|(i, p)| {
            let indicator = if p.is_dir() { "✓" } else { "✗" };
            format!("{} [{}] {}", i + 1, indicator, p.display())
        })
        .collect();
    options.push("Add a folder...".to_string());

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Source folders")
        .items(&options)
        .default(options.len() - 1)
        .interact_on_opt(term)?;

    match selection {
        None => Ok(false),
        Some(idx) if idx < config.source_folders.len() => {
            let confirm = Confirm::new()
                .with_prompt(format!(
                    "Remove {}?",
                    config.source_folders[idx].display()
                ))
                .default(false)
                .interact()?;
            Ok(confirm && remove_source_folder(config, idx).is_some())
        }
        Some(_) => {
            let path: String = Input::new()
                .with_prompt("Folder to watch")
                .interact_text()?;
            Ok(add_source_folder(config, &path))
        }
    }
}

fn toggle(value: &mut bool, prompt: &str) -> Result<bool> {
    let answer = Confirm::new()
        .with_prompt(prompt)
        .default(*value)
        .interact()?;
    let changed = answer != *value;
    *value = answer;
    Ok(changed)
}

const fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}
