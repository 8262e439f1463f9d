use crate::model::{ConfigError, Source};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

#[derive(Debug, Clone, Deserialize)]
pub struct QueryConfig {
    pub category: String,
    pub location: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SweepConfig {
    pub queries: Vec<QueryConfig>,
    pub max_pages: u32,
    pub fetch_details: bool,
    pub backfill: bool,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            queries: Vec::new(),
            max_pages: 5,
            fetch_details: false,
            backfill: false,
        }
    }
}

/// A one-off cities x categories sweep run at startup.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BulkConfig {
    pub cities: Vec<String>,
    pub categories: Vec<String>,
    pub pages_per_combo: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_path: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub audit_timeout_secs: u64,
    pub detail_delay_ms: u64,
    pub places_token_delay_ms: u64,
    pub bulk_stagger_ms: u64,
    pub workers: usize,
    pub check_interval_seconds: u64,
    pub audit_batch: usize,
    pub sweep: SweepConfig,
    pub bulk: Option<BulkConfig>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_path: "prospector.db".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36".to_string(),
            request_timeout_secs: 15,
            audit_timeout_secs: 15,
            detail_delay_ms: 750,
            places_token_delay_ms: 2000,
            bulk_stagger_ms: 100,
            workers: 4,
            check_interval_seconds: 3600,
            audit_batch: 50,
            sweep: SweepConfig::default(),
            bulk: None,
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn audit_timeout(&self) -> Duration {
        Duration::from_secs(self.audit_timeout_secs)
    }

    pub fn bulk_stagger(&self) -> Duration {
        Duration::from_millis(self.bulk_stagger_ms)
    }
}

pub fn load_config(path: &str) -> Result<AppConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    Ok(config)
}

/// Recognized keys of the persisted settings table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingKey {
    GooglePlacesApiKey,
    DefaultProvince,
    DefaultCity,
    DefaultCategory,
    EnabledSources,
    AuditConcurrency,
}

impl SettingKey {
    pub const ALL: [SettingKey; 6] = [
        SettingKey::GooglePlacesApiKey,
        SettingKey::DefaultProvince,
        SettingKey::DefaultCity,
        SettingKey::DefaultCategory,
        SettingKey::EnabledSources,
        SettingKey::AuditConcurrency,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SettingKey::GooglePlacesApiKey => "google_places_api_key",
            SettingKey::DefaultProvince => "default_province",
            SettingKey::DefaultCity => "default_city",
            SettingKey::DefaultCategory => "default_category",
            SettingKey::EnabledSources => "enabled_sources",
            SettingKey::AuditConcurrency => "audit_concurrency",
        }
    }

    pub fn default_value(&self) -> &'static str {
        match self {
            SettingKey::GooglePlacesApiKey => "",
            SettingKey::DefaultProvince => "Western Cape",
            SettingKey::DefaultCity => "Cape Town",
            SettingKey::DefaultCategory => "restaurant",
            SettingKey::EnabledSources => "yellow_pages,brabys",
            SettingKey::AuditConcurrency => "5",
        }
    }
}

impl FromStr for SettingKey {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SettingKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| s.to_string())
    }
}

/// Settings as read from storage, with defaults filled in.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub google_places_api_key: Option<String>,
    pub default_province: String,
    pub default_city: String,
    pub default_category: String,
    pub enabled_sources: Vec<Source>,
    /// Advisory only; logged but not enforced.
    pub audit_concurrency: usize,
}

impl Settings {
    pub fn from_values(values: &HashMap<SettingKey, String>) -> Self {
        let get = |key: SettingKey| -> String {
            values
                .get(&key)
                .cloned()
                .unwrap_or_else(|| key.default_value().to_string())
        };

        let enabled_sources = get(SettingKey::EnabledSources)
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .filter_map(|s| match s.parse::<Source>() {
                Ok(source) if source.is_scrapeable() => Some(source),
                _ => {
                    warn!("Ignoring unknown source in enabled_sources: {}", s);
                    None
                }
            })
            .collect();

        let api_key = get(SettingKey::GooglePlacesApiKey);

        Self {
            google_places_api_key: Some(api_key.trim().to_string()).filter(|k| !k.is_empty()),
            default_province: get(SettingKey::DefaultProvince),
            default_city: get(SettingKey::DefaultCity),
            default_category: get(SettingKey::DefaultCategory),
            enabled_sources,
            audit_concurrency: get(SettingKey::AuditConcurrency).trim().parse().unwrap_or(5),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_values(&HashMap::new())
    }
}

/// Everything a scraper needs from configuration, resolved before it is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ScraperConfig {
    pub places_api_key: Option<String>,
    pub request_timeout: Duration,
    pub detail_delay: Duration,
    pub places_token_delay: Duration,
}

impl ScraperConfig {
    pub fn resolve(app: &AppConfig, settings: &Settings) -> Self {
        Self {
            places_api_key: settings.google_places_api_key.clone(),
            request_timeout: app.request_timeout(),
            detail_delay: Duration::from_millis(app.detail_delay_ms),
            places_token_delay: Duration::from_millis(app.places_token_delay_ms),
        }
    }

    /// No delays, no key.
    #[cfg(test)]
    pub fn immediate() -> Self {
        Self {
            places_api_key: None,
            request_timeout: Duration::from_secs(15),
            detail_delay: Duration::ZERO,
            places_token_delay: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_config_fills_defaults() {
        let config: AppConfig = serde_json::from_str(
            r#"{ "database_path": "leads.db", "sweep": { "queries": [{ "category": "plumber", "location": "Durban" }] } }"#,
        )
        .unwrap();
        assert_eq!(config.database_path, "leads.db");
        assert_eq!(config.request_timeout_secs, 15);
        assert_eq!(config.sweep.max_pages, 5);
        assert_eq!(config.sweep.queries[0].location, "Durban");
        assert!(config.bulk.is_none());
    }

    #[test]
    fn settings_defaults_and_overrides() {
        let defaults = Settings::default();
        assert_eq!(defaults.default_city, "Cape Town");
        assert_eq!(defaults.google_places_api_key, None);
        assert_eq!(defaults.enabled_sources, vec![Source::YellowPages, Source::Brabys]);
        assert_eq!(defaults.audit_concurrency, 5);

        let mut values = HashMap::new();
        values.insert(SettingKey::GooglePlacesApiKey, " abc ".to_string());
        values.insert(SettingKey::EnabledSources, "cipc, manual, bogus".to_string());
        values.insert(SettingKey::AuditConcurrency, "lots".to_string());
        let settings = Settings::from_values(&values);
        assert_eq!(settings.google_places_api_key.as_deref(), Some("abc"));
        assert_eq!(settings.enabled_sources, vec![Source::Cipc]);
        assert_eq!(settings.audit_concurrency, 5);
    }

    #[test]
    fn setting_keys_are_an_allow_list() {
        assert_eq!("default_city".parse::<SettingKey>(), Ok(SettingKey::DefaultCity));
        assert!("admin_password".parse::<SettingKey>().is_err());
    }
}
