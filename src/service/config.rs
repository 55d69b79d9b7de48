use std::path::Path;

use serde::{Deserialize, Serialize};

use super::{AppError, AppResult};

#[derive(Debug, Default, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory for the rolling log file. Empty disables file logging.
    pub log_dir: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    /// Connection identity, also used as the display target name.
    pub name: String,
    pub address: String,
    pub port: u16,
    pub user: String,
    pub password: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            name: "matrix".to_string(),
            address: String::new(),
            port: 0,
            user: String::new(),
            password: String::new(),
        }
    }
}

/// TLS settings are opaque to the connection layer; only `check_hostname`
/// is inspected, for the status line.
#[derive(Debug, Default, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TlsConfig {
    pub enabled: bool,
    pub check_hostname: bool,
    /// PEM bundle with the trusted roots.
    pub ca_file: Option<String>,
}

impl TlsConfig {
    pub fn verifies_hostname(&self) -> bool {
        self.enabled && self.check_hostname
    }
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LinkConfig {
    pub general: GeneralConfig,
    pub server: ServerConfig,
    pub tls: TlsConfig,
}

impl LinkConfig {
    pub fn set_up_config<P: AsRef<Path>>(path: P) -> AppResult<LinkConfig> {
        let path_str = path
            .as_ref()
            .to_str()
            .ok_or_else(|| {
                AppError::InvalidValue(format!(
                    "config file path: {}",
                    path.as_ref().to_string_lossy()
                ))
            })?;
        let config = config::Config::builder()
            .add_source(config::File::with_name(path_str))
            .add_source(config::Environment::with_prefix("MATRIXLINK").separator("__"))
            .build()?;

        let link_config: LinkConfig = config.try_deserialize()?;

        Ok(link_config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_full_config() {
        let file = write_config(
            r#"
[general]
log_dir = "logs"

[server]
name = "home"
address = "matrix.example.org"
port = 8448
user = "alice"
password = "secret"

[tls]
enabled = true
check_hostname = true
ca_file = "/etc/ssl/certs/ca.pem"
"#,
        );

        let config = LinkConfig::set_up_config(file.path()).unwrap();
        assert_eq!(config.general.log_dir, "logs");
        assert_eq!(config.server.name, "home");
        assert_eq!(config.server.address, "matrix.example.org");
        assert_eq!(config.server.port, 8448);
        assert_eq!(config.server.user, "alice");
        assert_eq!(config.server.password, "secret");
        assert!(config.tls.verifies_hostname());
        assert_eq!(config.tls.ca_file.as_deref(), Some("/etc/ssl/certs/ca.pem"));
    }

    #[test]
    fn test_missing_sections_fall_back_to_defaults() {
        let file = write_config(
            r#"
[server]
address = "localhost"
port = 8008
"#,
        );

        let config = LinkConfig::set_up_config(file.path()).unwrap();
        assert_eq!(config.server.name, "matrix");
        assert_eq!(config.server.address, "localhost");
        assert!(config.server.user.is_empty());
        assert!(!config.tls.enabled);
        assert!(!config.tls.verifies_hostname());
        assert!(config.general.log_dir.is_empty());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let result = LinkConfig::set_up_config("/nonexistent/matrixlink/conf.toml");
        assert!(matches!(result, Err(AppError::ConfigFileError(_))));
    }

    #[test]
    fn test_hostname_check_requires_tls() {
        let tls = TlsConfig {
            enabled: false,
            check_hostname: true,
            ca_file: None,
        };
        assert!(!tls.verifies_hostname());
    }
}
