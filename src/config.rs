use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::info;

use crate::error::{SettingError, StoreError};
use crate::store::KvStore;
use crate::tagger::parse_tag_list;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:80";
pub const DEFAULT_USER_ID: i64 = 1;

const KEYS: &[&str] = &[
    "serverUrl",
    "apiKey",
    "userId",
    "autoTags",
    "notifications",
    "defaultTags",
    "autoFillTags",
];

/// User settings, persisted one key per field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub server_url: String,
    pub api_key: String,
    pub user_id: i64,
    pub auto_tags: bool,
    pub notifications: bool,
    pub default_tags: String,
    pub auto_fill_tags: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_key: String::new(),
            user_id: DEFAULT_USER_ID,
            auto_tags: true,
            notifications: true,
            default_tags: String::new(),
            auto_fill_tags: false,
        }
    }
}

/// What the sync client needs, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncSettings {
    pub server_url: String,
    pub api_key: String,
    pub user_id: i64,
}

impl Config {
    /// Stored values over defaults, then environment overrides.
    pub fn load<S: KvStore>(store: &S) -> Result<Self, StoreError> {
        let stored = store.get(KEYS)?;
        let mut config: Config = serde_json::from_value(Value::Object(stored))?;
        config.apply_env();
        Ok(config)
    }

    /// First-run initialisation: write defaults unless a server URL is already stored.
    pub fn init_defaults<S: KvStore>(store: &S) -> Result<bool, StoreError> {
        if store.get_one("serverUrl")?.is_some() {
            return Ok(false);
        }
        Config::default().save(store)?;
        info!("Wrote default configuration");
        Ok(true)
    }

    pub fn save<S: KvStore>(&self, store: &S) -> Result<(), StoreError> {
        match serde_json::to_value(self)? {
            Value::Object(map) => store.set(map),
            _ => Err(StoreError::Backend("config did not serialize to an object".into())),
        }
    }

    /// Validate and store a single setting given as text.
    pub fn set_key<S: KvStore>(store: &S, key: &str, raw: &str) -> Result<(), SettingError> {
        let invalid = |expected| SettingError::InvalidValue {
            key: key.to_string(),
            expected,
            value: raw.to_string(),
        };
        let value = match key {
            "serverUrl" | "apiKey" | "defaultTags" => Value::String(raw.trim().to_string()),
            "userId" => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| invalid("an integer"))?,
            "autoTags" | "notifications" | "autoFillTags" => raw
                .trim()
                .parse::<bool>()
                .map(Value::Bool)
                .map_err(|_| invalid("true or false"))?,
            _ => return Err(SettingError::UnknownKey(key.to_string())),
        };
        let mut entries = Map::new();
        entries.insert(key.to_string(), value);
        store.set(entries)?;
        Ok(())
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            server_url: self.server_url.trim_end_matches('/').to_string(),
            api_key: self.api_key.clone(),
            user_id: self.user_id,
        }
    }

    /// Tags to pre-fill an interactive draft with.
    pub fn prefill_tags(&self) -> Vec<String> {
        if self.auto_fill_tags {
            parse_tag_list(&self.default_tags)
        } else {
            Vec::new()
        }
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("BOOKMARK_SERVER_URL") {
            if !url.trim().is_empty() {
                self.server_url = url.trim().to_string();
            }
        }
        if let Ok(key) = std::env::var("BOOKMARK_API_KEY") {
            self.api_key = key;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use serde_json::json;

    #[test]
    fn empty_store_yields_defaults() {
        let store = MemoryStore::new();
        let config: Config = serde_json::from_value(Value::Object(store.get(KEYS).unwrap())).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.server_url, "http://127.0.0.1:80");
        assert_eq!(config.user_id, 1);
        assert!(config.api_key.is_empty());
    }

    #[test]
    fn init_does_not_clobber_existing_settings() {
        let store = MemoryStore::new();
        store.set_one("serverUrl", json!("https://bm.example.com")).unwrap();
        assert!(!Config::init_defaults(&store).unwrap());
        assert_eq!(store.get_one("serverUrl").unwrap(), Some(json!("https://bm.example.com")));
    }

    #[test]
    fn init_writes_every_key() {
        let store = MemoryStore::new();
        assert!(Config::init_defaults(&store).unwrap());
        let stored = store.get(KEYS).unwrap();
        assert_eq!(stored.len(), KEYS.len());
        assert_eq!(stored["autoTags"], json!(true));
    }

    #[test]
    fn set_key_validates_types() {
        let store = MemoryStore::new();
        Config::set_key(&store, "userId", "42").unwrap();
        Config::set_key(&store, "autoFillTags", "true").unwrap();
        assert!(matches!(
            Config::set_key(&store, "userId", "forty-two"),
            Err(SettingError::InvalidValue { expected: "an integer", .. })
        ));
        assert!(matches!(
            Config::set_key(&store, "notifications", "maybe"),
            Err(SettingError::InvalidValue { .. })
        ));
        assert!(matches!(
            Config::set_key(&store, "colour", "blue"),
            Err(SettingError::UnknownKey(key)) if key == "colour"
        ));

        let stored = store.get(KEYS).unwrap();
        let config: Config = serde_json::from_value(Value::Object(stored)).unwrap();
        assert_eq!(config.user_id, 42);
        assert!(config.auto_fill_tags);
    }

    #[test]
    fn set_key_reports_store_failures_separately() {
        let store = MemoryStore::failing();
        assert!(matches!(
            Config::set_key(&store, "apiKey", "secret"),
            Err(SettingError::Store(_))
        ));
    }

    #[test]
    fn sync_settings_trim_trailing_slash() {
        let config = Config {
            server_url: "http://localhost:8000/".into(),
            ..Config::default()
        };
        assert_eq!(config.sync_settings().server_url, "http://localhost:8000");
    }

    #[test]
    fn prefill_requires_auto_fill() {
        let mut config = Config {
            default_tags: "read, later".into(),
            ..Config::default()
        };
        assert!(config.prefill_tags().is_empty());
        config.auto_fill_tags = true;
        assert_eq!(config.prefill_tags(), vec!["read", "later"]);
    }
}
