//! JSON persistence for sender and listener configuration.
//!
//! Settings files hold a single configuration object with camelCase keys.
//! Missing keys take their default values, so a file containing only
//! `{"serverAddress": "10.0.0.5", "serverPort": 7000}` is a complete sender
//! configuration. Values are not validated here; [`Sender::new`] and
//! [`Listener::new`] reject configurations they cannot run with.
//!
//! [`Sender::new`]: crate::tcp::Sender::new
//! [`Listener::new`]: crate::tcp::Listener::new
//!
//! # Example
//!
//! ```no_run
//! use horizon_relay_net::settings::{load_settings, save_settings};
//! use horizon_relay_net::tcp::ConnectionConfig;
//!
//! let config = ConnectionConfig::new("10.0.0.5", 7000).retry_interval_ms(2_000);
//! save_settings("relay.json", &config)?;
//!
//! let loaded = load_settings("relay.json")?;
//! assert_eq!(loaded, config);
//! # Ok::<(), horizon_relay_net::NetworkError>(())
//! ```

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::Result;
use crate::error::NetworkError;
use crate::tcp::{ConnectionConfig, ListenerConfig};

/// Load a sender configuration from a JSON file.
///
/// A missing or unreadable file is an error.
pub fn load_settings(path: impl AsRef<Path>) -> Result<ConnectionConfig> {
    load_json(path.as_ref())
}

/// Save a sender configuration as pretty-printed JSON.
///
/// The file is replaced atomically.
pub fn save_settings(path: impl AsRef<Path>, config: &ConnectionConfig) -> Result<()> {
    save_json(path.as_ref(), config)
}

/// Load a listener configuration from a JSON file.
pub fn load_listener_settings(path: impl AsRef<Path>) -> Result<ListenerConfig> {
    load_json(path.as_ref())
}

/// Save a listener configuration as pretty-printed JSON.
pub fn save_listener_settings(path: impl AsRef<Path>, config: &ListenerConfig) -> Result<()> {
    save_json(path.as_ref(), config)
}

impl ConnectionConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl ListenerConfig {
    /// Parse a configuration from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the configuration as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path).map_err(|e| {
        NetworkError::Settings(format!("Failed to read {}: {e}", path.display()))
    })?;
    let value = serde_json::from_str(&content).map_err(|e| {
        NetworkError::Settings(format!("Failed to parse {}: {e}", path.display()))
    })?;
    tracing::debug!(path = %path.display(), "Loaded settings");
    Ok(value)
}

fn save_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;

    // Write next to the target, then rename over it.
    let temp_path = path.with_extension("json.tmp");
    let write = || -> std::io::Result<()> {
        let mut file = fs::File::create(&temp_path)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    };
    if let Err(e) = write() {
        let _ = fs::remove_file(&temp_path);
        return Err(NetworkError::Settings(format!(
            "Failed to write {}: {e}",
            path.display()
        )));
    }

    tracing::debug!(path = %path.display(), "Saved settings");
    Ok(())
}
