pub mod loader;
pub mod schema;

pub use loader::{
    default_config_path, load_default, load_from_path, load_from_str, ConfigError, CONFIG_ENV,
    GAME_DIR_ENV,
};
pub use schema::{AuthSettings, PatcherConfig, ValidationError, ValidationIssue};
