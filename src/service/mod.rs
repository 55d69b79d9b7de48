pub use self::config::{GeneralConfig, LinkConfig, ServerConfig, TlsConfig};
pub use app_error::{AppError, AppResult, ConfigError, TransportError};
pub use tracing_config::{setup_console_tracing, setup_local_tracing, setup_tracing};

mod app_error;
mod config;
mod tracing_config;
