use env_logger::Env;

/// 初始化 logger；靜默模式為 info，否則為 debug，`RUST_LOG` 可覆寫
pub fn init(silent_mode: bool) {
    let default_level = if silent_mode { "info" } else { "debug" };

    env_logger::Builder::from_env(Env::default().default_filter_or(default_level))
        .format_timestamp_secs()
        .format_target(false)
        .init();
}
