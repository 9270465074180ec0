pub mod settings;
pub mod user;

pub use settings::{
    DEFAULT_CODE_LENS_REFRESH_DELAY_MS, DEFAULT_EVENT_BUFFER, DEFAULT_SYNCHRONIZATION_TIMEOUT_MS,
    Settings,
};
pub use user::{load_settings, load_user_settings, user_config_path};
