//! Tracked-app and language configuration.
//!
//! Loaded once at process start from a JSON settings file and passed by
//! reference into each component; there is no global settings cache.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct SettingsFile {
    apps: BTreeMap<String, AppEntry>,
    languages: BTreeMap<String, LanguageEntry>,
}

#[derive(Debug, Deserialize)]
struct AppEntry {
    track: bool,
}

#[derive(Debug, Deserialize)]
struct LanguageEntry {
    name: String,
    steam_key: String,
    track: bool,
}

/// One tracked (or untracked) Steam title.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub appid: i64,
    pub track: bool,
}

/// One configured review language. `steam_key` is the filter token the
/// upstream API expects (e.g. "english"); `lang_key` is our stable key.
#[derive(Debug, Clone)]
pub struct Language {
    pub lang_key: String,
    pub name: String,
    pub steam_key: String,
    pub track: bool,
}

#[derive(Debug, Clone)]
pub struct Settings {
    apps: Vec<AppConfig>,
    languages: Vec<Language>,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading settings file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("parsing settings file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let file: SettingsFile = serde_json::from_str(raw)?;
        let mut apps = Vec::with_capacity(file.apps.len());
        for (appid, entry) in file.apps {
            let appid = appid
                .parse::<i64>()
                .with_context(|| format!("app key '{appid}' is not a numeric appid"))?;
            apps.push(AppConfig {
                appid,
                track: entry.track,
            });
        }
        let languages = file
            .languages
            .into_iter()
            .map(|(lang_key, entry)| Language {
                lang_key,
                name: entry.name,
                steam_key: entry.steam_key,
                track: entry.track,
            })
            .collect();
        Ok(Self { apps, languages })
    }

    pub fn tracked_apps(&self) -> Vec<&AppConfig> {
        self.apps.iter().filter(|a| a.track).collect()
    }

    pub fn tracked_languages(&self) -> Vec<&Language> {
        self.languages.iter().filter(|l| l.track).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "apps": {
            "440": { "track": true },
            "570": { "track": false }
        },
        "languages": {
            "en": { "name": "English", "steam_key": "english", "track": true },
            "de": { "name": "German", "steam_key": "german", "track": false }
        }
    }"#;

    #[test]
    fn tracked_filters_apply() {
        let settings = Settings::from_json(SAMPLE).unwrap();
        let apps = settings.tracked_apps();
        assert_eq!(apps.len(), 1);
        assert_eq!(apps[0].appid, 440);

        let langs = settings.tracked_languages();
        assert_eq!(langs.len(), 1);
        assert_eq!(langs[0].lang_key, "en");
        assert_eq!(langs[0].steam_key, "english");
    }

    #[test]
    fn non_numeric_appid_is_rejected() {
        let raw = r#"{"apps": {"tf2": {"track": true}}, "languages": {}}"#;
        assert!(Settings::from_json(raw).is_err());
    }
}
