use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::feeding::classifier::{ClassifierPolicy, DEFAULT_OK_RATIO};
use crate::herd::ration::{default_coefficient, GroupRationProfile, RationBook};
use crate::herd::Group;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default = "default_rations")]
    pub rations: BTreeMap<String, f64>,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub alerts: AlertsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    #[serde(default = "default_ok_ratio")]
    pub ok_ratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    #[serde(default)]
    pub admin_email: String,
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_enable_stdout")]
    pub enable_stdout: bool,
    #[serde(default)]
    pub rules: AlertRulesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRulesConfig {
    #[serde(default = "default_true")]
    pub feeding_shortfall: bool,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub db_path: Option<String>,
    pub ok_ratio: Option<f64>,
    pub webhook_url: Option<String>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/herd-feed/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(db_path) = overrides.db_path {
            self.storage.db_path = db_path;
        }
        if let Some(ok_ratio) = overrides.ok_ratio {
            self.classifier.ok_ratio = ok_ratio;
        }
        if let Some(webhook_url) = overrides.webhook_url {
            self.alerts.webhook_url = webhook_url;
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }

    /// Ration profiles for the groups listed under `[rations]`. Groups left
    /// out have no profile, and feedings for them are unclassifiable.
    pub fn ration_book(&self) -> Result<RationBook> {
        let mut book = RationBook::default();
        for (name, coefficient) in &self.rations {
            let group: Group = name
                .parse()
                .with_context(|| format!("invalid [rations] entry: {name}"))?;
            book.insert(GroupRationProfile::new(group, *coefficient)?);
        }
        Ok(book)
    }

    pub fn classifier_policy(&self) -> Result<ClassifierPolicy> {
        Ok(ClassifierPolicy::new(self.classifier.ok_ratio)?)
    }

    pub fn default_template() -> String {
        let template = r#"[storage]
db_path = "~/.local/share/herd-feed/herd.db"

# kg of feed per kg of body weight per day
[rations]
piglet = 0.05
pregnant = 0.03
grower = 0.04
adult = 0.025
quarantine = 0.02

[classifier]
# share of the expected ration that still counts as fed
ok_ratio = 0.85

[alerts]
admin_email = ""
webhook_url = ""
enable_stdout = true

[alerts.rules]
feeding_shortfall = true
"#;
        template.to_string()
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            rations: default_rations(),
            classifier: ClassifierConfig::default(),
            alerts: AlertsConfig::default(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            ok_ratio: default_ok_ratio(),
        }
    }
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            admin_email: String::new(),
            webhook_url: String::new(),
            enable_stdout: default_enable_stdout(),
            rules: AlertRulesConfig::default(),
        }
    }
}

impl Default for AlertRulesConfig {
    fn default() -> Self {
        Self {
            feeding_shortfall: true,
        }
    }
}

fn default_db_path() -> String {
    "~/.local/share/herd-feed/herd.db".to_string()
}

fn default_rations() -> BTreeMap<String, f64> {
    Group::ALL
        .iter()
        .map(|group| (group.as_slug().to_string(), default_coefficient(*group)))
        .collect()
}

fn default_ok_ratio() -> f64 {
    DEFAULT_OK_RATIO
}

fn default_enable_stdout() -> bool {
    true
}

fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::{Config, ConfigOverrides};
    use crate::herd::ration::RationBook;
    use crate::herd::Group;

    #[test]
    fn template_parses_to_defaults() {
        let parsed: Config = toml::from_str(&Config::default_template()).unwrap();
        assert_eq!(parsed.rations, Config::default().rations);
        assert_eq!(parsed.classifier.ok_ratio, 0.85);
        assert!(parsed.alerts.rules.feeding_shortfall);
        assert_eq!(parsed.ration_book().unwrap(), RationBook::with_defaults());
    }

    #[test]
    fn empty_file_uses_defaults() {
        let parsed: Config = toml::from_str("").unwrap();
        assert_eq!(parsed.ration_book().unwrap().len(), Group::ALL.len());
        assert!(parsed.alerts.enable_stdout);
    }

    #[test]
    fn partial_rations_leave_groups_unprofiled() {
        let parsed: Config = toml::from_str("[rations]\ngrower = 0.045\n").unwrap();
        let book = parsed.ration_book().unwrap();
        assert_eq!(book.coefficient(Group::Grower), Some(0.045));
        assert_eq!(book.coefficient(Group::Adult), None);
    }

    #[test]
    fn invalid_rations_are_reported() {
        let bad_group: Config = toml::from_str("[rations]\nweaner = 0.05\n").unwrap();
        assert!(bad_group.ration_book().is_err());
        let bad_value: Config = toml::from_str("[rations]\ngrower = 0.0\n").unwrap();
        assert!(bad_value.ration_book().is_err());
    }

    #[test]
    fn overrides_replace_values() {
        let mut config = Config::default();
        config.apply_overrides(ConfigOverrides {
            db_path: Some("/tmp/herd.db".to_string()),
            ok_ratio: Some(0.9),
            webhook_url: None,
        });
        assert_eq!(config.resolved_db_path().to_str(), Some("/tmp/herd.db"));
        assert_eq!(config.classifier_policy().unwrap().ok_ratio, 0.9);

        config.classifier.ok_ratio = -1.0;
        assert!(config.classifier_policy().is_err());
    }
}
