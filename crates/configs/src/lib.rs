use anyhow::Result;
use serde::Deserialize;
use anyhow::anyhow;

/// Environment variable selecting the storage kind.
pub const ENV_STORAGE: &str = "PROMHSD_STORAGE";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Which backend to open and the opaque string handed to its provider
/// (file path, table name, connection URI).
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct StorageConfig {
    #[serde(default = "default_kind")]
    pub kind: String,
    #[serde(default = "default_args")]
    pub args: String,
}

fn default_kind() -> String {
    "filedb".into()
}

fn default_args() -> String {
    "data/targets.json".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { kind: default_kind(), args: default_args() }
    }
}

/// `PROMHSD_<KIND>_ARGS`, e.g. `PROMHSD_FILEDB_ARGS`.
pub fn args_var(kind: &str) -> String {
    format!("PROMHSD_{}_ARGS", kind.to_uppercase())
}

pub fn load_default() -> Result<AppConfig> {
    let path = std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());
    load_or_default(&path)
}

/// Like [`load_from_file`], but a missing file yields the defaults.
/// Unreadable or malformed files are still errors.
pub fn load_or_default(path: &str) -> Result<AppConfig> {
    match load_from_file(path) {
        Err(e) if is_not_found(&e) => Ok(AppConfig::default()),
        other => other,
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .is_some_and(|io| io.kind() == std::io::ErrorKind::NotFound)
}

pub fn load_from_file(path: &str) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let cfg: AppConfig = toml::from_str(&content)?;
    Ok(cfg)
}

impl AppConfig {
    /// File config if present (defaults otherwise), then environment overrides.
    pub fn load_and_validate() -> Result<Self> {
        let mut cfg = load_default()?;
        cfg.storage.apply_overrides(|key| std::env::var(key).ok());
        cfg.normalize_and_validate()?;
        Ok(cfg)
    }

    pub fn normalize_and_validate(&mut self) -> Result<()> {
        self.storage.normalize();
        self.storage.validate()
    }
}

impl StorageConfig {
    /// Apply `PROMHSD_STORAGE` and then the args variable of the resulting kind.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(kind) = lookup(ENV_STORAGE)
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty())
        {
            if kind != self.kind.trim().to_lowercase() {
                // args configured for another kind make no sense here
                self.args = String::new();
            }
            self.kind = kind;
        }
        if let Some(args) = lookup(&args_var(&self.kind)) {
            self.args = args;
        }
    }

    fn normalize(&mut self) {
        self.kind = self.kind.trim().to_lowercase();
        self.args = self.args.trim().to_string();
    }

    pub fn validate(&self) -> Result<()> {
        if self.kind.is_empty() {
            return Err(anyhow!("storage.kind is empty; set it in config.toml or {ENV_STORAGE}"));
        }
        Ok(())
    }
}
