use std::{collections::HashMap, fs};

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub api_base_url: String,
    pub request_timeout_secs: u64,
    pub notification_ttl_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:8000/api".into(),
            request_timeout_secs: 30,
            notification_ttl_ms: 3000,
        }
    }
}

/// Loads settings from an optional `catalog.toml` in the working directory,
/// then applies environment-variable overrides on top. Environment always
/// wins over the file, which wins over the built-in defaults.
pub fn load_settings() -> Settings {
    let mut settings = Settings::default();

    if let Ok(raw) = fs::read_to_string("catalog.toml") {
        if let Ok(file_cfg) = toml::from_str::<HashMap<String, String>>(&raw) {
            apply_file_values(&mut settings, &file_cfg);
        }
    }

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());

    settings.api_base_url = normalize_base_url(&settings.api_base_url);
    settings
}

fn apply_file_values(settings: &mut Settings, file_cfg: &HashMap<String, String>) {
    if let Some(v) = file_cfg.get("api_base_url") {
        settings.api_base_url = v.clone();
    }
    if let Some(v) = file_cfg.get("request_timeout_secs") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }
    if let Some(v) = file_cfg.get("notification_ttl_ms") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.notification_ttl_ms = parsed;
        }
    }
}

fn apply_env_overrides(settings: &mut Settings, get: impl Fn(&str) -> Option<String>) {
    if let Some(v) = get("CATALOG_API_BASE_URL") {
        settings.api_base_url = v;
    }
    if let Some(v) = get("APP__API_BASE_URL") {
        settings.api_base_url = v;
    }

    if let Some(v) = get("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.request_timeout_secs = parsed;
        }
    }

    if let Some(v) = get("APP__NOTIFICATION_TTL_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.notification_ttl_ms = parsed;
        }
    }
}

/// Gateways join paths with a single slash, so the base url must not carry a
/// trailing one.
fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Settings::default().api_base_url;
    }
    trimmed.trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_trailing_slashes_from_base_url() {
        assert_eq!(
            normalize_base_url("http://localhost:8000/api///"),
            "http://localhost:8000/api"
        );
    }

    #[test]
    fn empty_base_url_falls_back_to_default() {
        assert_eq!(normalize_base_url("   "), Settings::default().api_base_url);
    }

    #[test]
    fn file_values_override_defaults() {
        let mut settings = Settings::default();
        let mut file_cfg = HashMap::new();
        file_cfg.insert("api_base_url".to_string(), "http://files:1234".to_string());
        file_cfg.insert("request_timeout_secs".to_string(), "5".to_string());
        file_cfg.insert("notification_ttl_ms".to_string(), "not-a-number".to_string());

        apply_file_values(&mut settings, &file_cfg);

        assert_eq!(settings.api_base_url, "http://files:1234");
        assert_eq!(settings.request_timeout_secs, 5);
        assert_eq!(
            settings.notification_ttl_ms,
            Settings::default().notification_ttl_ms
        );
    }

    #[test]
    fn env_overrides_win_over_file_values() {
        let mut settings = Settings::default();
        let mut file_cfg = HashMap::new();
        file_cfg.insert("api_base_url".to_string(), "http://files:1234".to_string());
        apply_file_values(&mut settings, &file_cfg);

        let mut env = HashMap::new();
        env.insert(
            "CATALOG_API_BASE_URL".to_string(),
            "http://env:9999".to_string(),
        );
        env.insert("APP__REQUEST_TIMEOUT_SECS".to_string(), "7".to_string());
        apply_env_overrides(&mut settings, |key| env.get(key).cloned());

        assert_eq!(settings.api_base_url, "http://env:9999");
        assert_eq!(settings.request_timeout_secs, 7);
    }
}
