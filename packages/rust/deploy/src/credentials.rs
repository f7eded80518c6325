//! FTP credentials file (`credentials.json`).
//!
//! The file is kept out of version control; only its location is configured
//! in `themekit.toml`.

use std::path::Path;

use serde::Deserialize;

use themekit_shared::{Result, ThemekitError};

const DEFAULT_FTP_PORT: u16 = 21;

/// Connection settings for the deploy target.
#[derive(Clone, Deserialize)]
pub struct Credentials {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    #[serde(default)]
    pub password: String,
    /// Remote directory the build output is mirrored into.
    #[serde(rename = "remoteFolder", alias = "remote_folder")]
    pub remote_folder: String,
    /// Accepted for compatibility with older credential files; uploads are sequential.
    #[serde(default)]
    pub parallel: Option<u32>,
    /// Log every FTP command at debug level.
    #[serde(default)]
    pub log: bool,
}

fn default_port() -> u16 {
    DEFAULT_FTP_PORT
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("remote_folder", &self.remote_folder)
            .finish()
    }
}

/// Read credentials from `path`; a non-empty `password_env` variable
/// replaces the password stored in the file.
pub fn load_credentials(path: &Path, password_env: &str) -> Result<Credentials> {
    if !path.exists() {
        return Err(ThemekitError::config(format!(
            "credentials file {} not found; create it with host, user, password and remoteFolder",
            path.display()
        )));
    }

    let content = std::fs::read_to_string(path).map_err(|e| ThemekitError::io(path, e))?;
    let mut credentials: Credentials = serde_json::from_str(&content)
        .map_err(|e| ThemekitError::config(format!("failed to parse {}: {e}", path.display())))?;

    if let Ok(password) = std::env::var(password_env) {
        if !password.is_empty() {
            tracing::debug!(var = password_env, "password taken from environment");
            credentials.password = password;
        }
    }

    if credentials.host.trim().is_empty() {
        return Err(ThemekitError::validation("credentials: host is empty"));
    }

    Ok(credentials)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_legacy_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("credentials.json");
        std::fs::write(
            &path,
            r#"{
                "host": "ftp.example.com",
                "user": "deploy",
                "password": "s3cret",
                "parallel": 10,
                "log": true,
                "remoteFolder": "/public_html/"
            }"#,
        )
        .unwrap();

        let creds = load_credentials(&path, "THEMEKIT_TEST_UNSET_PASSWORD_VAR").unwrap();
        assert_eq!(creds.host, "ftp.example.com");
        assert_eq!(creds.port, 21);
        assert_eq!(creds.remote_folder, "/public_html/");
        assert_eq!(creds.password, "s3cret");
        assert!(creds.log);
    }

    #[test]
    fn debug_redacts_password() {
        let creds: Credentials = serde_json::from_str(
            r#"{"host":"h","user":"u","password":"hunter2","remote_folder":"/"}"#,
        )
        .unwrap();
        let shown = format!("{creds:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn missing_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_credentials(&dir.path().join("credentials.json"), "X").unwrap_err();
        assert!(matches!(err, ThemekitError::Config { .. }));
    }
}
