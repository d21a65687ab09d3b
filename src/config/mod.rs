pub mod load;
pub mod save;
pub mod types;

pub use types::{
    Config, ConfigError, DEFAULT_SETTINGS_FILE, DEFAULT_STATE_FILE, SharedConfig, StabilityMode,
    extension_of, normalize_extension,
};
