use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use anyhow::{Result, anyhow};

pub const DEFAULT_WIDTH: u16 = 100;
pub const DEFAULT_HEIGHT: u16 = 95;

/// Widget settings, mutated only through a validated apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Widget width as a percentage of the terminal, 50-100.
    pub width_percent: u16,
    /// Widget height as a percentage of the terminal, 50-100.
    pub height_percent: u16,
    /// Optional system prompt sent along with every message, max 500 chars.
    pub system_prompt: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            width_percent: DEFAULT_WIDTH,
            height_percent: DEFAULT_HEIGHT,
            system_prompt: String::new(),
        }
    }
}

/// On-disk representation: a flat key-value map with string-encoded values,
/// matching the storage contract of the web widget this replaces.
#[derive(Serialize, Deserialize, Debug, Default)]
struct StoredSettings {
    #[serde(rename = "chatbot-system-prompt", default, skip_serializing_if = "Option::is_none")]
    system_prompt: Option<String>,
    #[serde(rename = "chatbot-width", default, skip_serializing_if = "Option::is_none")]
    width: Option<String>,
    #[serde(rename = "chatbot-height", default, skip_serializing_if = "Option::is_none")]
    height: Option<String>,
}

/// Durable key-value storage for settings.
#[derive(Debug, Clone)]
pub struct Storage {
    path: PathBuf,
}

impl Storage {
    /// Storage at the default location under the user config directory.
    pub fn open() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine config directory"))?;
        Ok(Self {
            path: config_dir.join("chatbot-tui").join("settings.json"),
        })
    }

    /// Storage at an explicit path (used by tests).
    pub fn at(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load saved settings; any missing or unreadable value falls back to
    /// its default, mirroring the `localStorage.getItem(..) || default`
    /// behavior of the original widget. Dimensions outside [50,100] count
    /// as unreadable: settings only ever leave this module validated.
    pub fn load(&self) -> Settings {
        let stored: StoredSettings = fs::read_to_string(&self.path)
            .ok()
            .and_then(|content| serde_json::from_str(&content).ok())
            .unwrap_or_default();

        let defaults = Settings::default();
        Settings {
            width_percent: stored
                .width
                .and_then(|w| w.parse().ok())
                .filter(|w| (50..=100).contains(w))
                .unwrap_or(defaults.width_percent),
            height_percent: stored
                .height
                .and_then(|h| h.parse().ok())
                .filter(|h| (50..=100).contains(h))
                .unwrap_or(defaults.height_percent),
            system_prompt: stored.system_prompt.unwrap_or(defaults.system_prompt),
        }
    }

    pub fn save(&self, settings: &Settings) -> Result<()> {
        // Create config directory if it doesn't exist
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let stored = StoredSettings {
            system_prompt: Some(settings.system_prompt.clone()),
            width: Some(settings.width_percent.to_string()),
            height: Some(settings.height_percent.to_string()),
        };
        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.path, content)?;
        Ok(())
    }

    /// Remove all persisted keys; a subsequent load yields defaults.
    pub fn reset(&self) -> Result<()> {
        if self.path.exists() {
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_without_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let storage = Storage::at(dir.path().join("settings.json"));
        assert_eq!(storage.load(), Settings::default());
    }

    #[test]
    fn settings_survive_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");

        let settings = Settings {
            width_percent: 80,
            height_percent: 90,
            system_prompt: "hello".to_string(),
        };
        Storage::at(path.clone()).save(&settings).unwrap();

        // Fresh handle, as after a restart
        let reloaded = Storage::at(path).load();
        assert_eq!(reloaded, settings);
    }

    #[test]
    fn values_are_string_encoded_under_fixed_keys() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        Storage::at(path.clone()).save(&Settings::default()).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["chatbot-width"], "100");
        assert_eq!(raw["chatbot-height"], "95");
        assert_eq!(raw["chatbot-system-prompt"], "");
    }

    #[test]
    fn reset_removes_persisted_values() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let storage = Storage::at(path.clone());

        storage
            .save(&Settings {
                width_percent: 60,
                height_percent: 70,
                system_prompt: "keep it short".to_string(),
            })
            .unwrap();
        storage.reset().unwrap();

        assert!(!path.exists());
        assert_eq!(storage.load(), Settings::default());
    }

    #[test]
    fn out_of_range_stored_dimensions_fall_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(
            &path,
            r#"{"chatbot-width": "200", "chatbot-height": "10", "chatbot-system-prompt": "hi"}"#,
        )
        .unwrap();

        let settings = Storage::at(path).load();
        assert_eq!(settings.width_percent, DEFAULT_WIDTH);
        assert_eq!(settings.height_percent, DEFAULT_HEIGHT);
        assert_eq!(settings.system_prompt, "hi");
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "not json").unwrap();

        assert_eq!(Storage::at(path).load(), Settings::default());
    }
}
