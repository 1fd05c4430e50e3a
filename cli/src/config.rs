use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Optional settings stored as JSON in the data directory.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Settings {
    /// Base URL of the remote nutrition server, e.g. "http://localhost:8080".
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub server_url: Option<String>,
    /// Display name used for feed posts and likes.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub author: Option<String>,
}

pub struct Config {
    pub db_path: PathBuf,
    pub data_dir: PathBuf,
    pub settings: Settings,
}

impl Config {
    pub fn load() -> Result<Self> {
        let proj_dirs =
            ProjectDirs::from("", "", "nosh").context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let db_path = data_dir.join("nosh.db");

        let settings_path = data_dir.join("settings.json");
        let settings = if settings_path.exists() {
            let json = std::fs::read_to_string(&settings_path)
                .context("Failed to read settings file")?;
            serde_json::from_str(&json).context("Failed to parse settings file")?
        } else {
            Settings::default()
        };

        Ok(Config {
            db_path,
            data_dir,
            settings,
        })
    }

    pub fn save_settings(&self) -> Result<()> {
        let path = self.data_dir.join("settings.json");
        let json = serde_json::to_string_pretty(&self.settings)?;
        std::fs::write(&path, json).context("Failed to write settings file")?;
        Ok(())
    }

    /// Display name for feed activity, defaulting to the OS username.
    #[must_use]
    pub fn author(&self) -> String {
        self.settings
            .author
            .clone()
            .or_else(|| std::env::var("USER").ok())
            .unwrap_or_else(|| "anonymous".to_string())
    }

    /// Read the client-side API key, if the user has paired with a server.
    pub fn load_api_key(&self) -> Result<Option<String>> {
        let path = self.data_dir.join("api_key");
        if !path.exists() {
            return Ok(None);
        }
        let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
        let key = key.trim().to_string();
        Ok(if key.is_empty() { None } else { Some(key) })
    }

    /// Store the key obtained from a server during pairing.
    pub fn save_api_key(&self, key: &str) -> Result<()> {
        let path = self.data_dir.join("api_key");
        std::fs::write(&path, key.trim()).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        Ok(())
    }

    /// Load the server's API key from disk, or generate a new one.
    ///
    /// Returns `(key, newly_created)` where `newly_created` is true when a
    /// fresh key was just generated (first run).
    pub fn load_or_create_api_key(&self) -> Result<(String, bool)> {
        use rand::Rng;
        use std::fmt::Write;

        let path = self.data_dir.join("api_key");

        if path.exists() {
            let key = std::fs::read_to_string(&path).context("Failed to read API key file")?;
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok((key, false));
            }
        }

        let bytes: [u8; 32] = rand::rng().random();
        let key = bytes
            .iter()
            .fold(String::with_capacity(64), |mut acc: String, b| {
                let _ = write!(acc, "{b:02x}");
                acc
            });
        std::fs::write(&path, &key).context("Failed to write API key file")?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .context("Failed to set API key file permissions")?;
        }
        eprintln!("Generated new API key: {key}");
        eprintln!("Include in requests: Authorization: Bearer {key}");
        Ok((key, true))
    }
}
