//! Layered settings: TOML file, then `BUDGETBUDDY__*` environment variables,
//! then command-line flags.

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::{cli::Args, error::Result};

const DEFAULT_CONFIG_PATH: &str = "config/budgetbuddy.toml";
const DEFAULT_SQLITE_PATH: &str = "budgetbuddy.db";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backend {
    Memory,
    Sqlite {
        #[serde(default = "default_sqlite_path")]
        path: String,
    },
    Rest {
        base_url: String,
        api_key: String,
        #[serde(default)]
        access_token: Option<String>,
    },
}

fn default_sqlite_path() -> String {
    DEFAULT_SQLITE_PATH.to_string()
}

impl Default for Backend {
    fn default() -> Self {
        Self::Sqlite {
            path: default_sqlite_path(),
        }
    }
}

impl Backend {
    /// Local backends have no sign-up hook creating the profile row.
    pub fn provisions_profiles(&self) -> bool {
        !matches!(self, Self::Rest { .. })
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub level: String,
    pub user: Option<String>,
    pub full_name: Option<String>,
    pub backend: Backend,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            user: None,
            full_name: None,
            backend: Backend::default(),
        }
    }
}

impl Settings {
    pub fn load(args: &Args) -> Result<Self> {
        let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
        let settings = Config::builder()
            .set_default("backend.kind", "sqlite")?
            .add_source(File::with_name(config_path).required(false))
            .add_source(Environment::with_prefix("BUDGETBUDDY").separator("__"))
            .set_override_option("level", args.level.clone())?
            .set_override_option("user", args.user.clone())?
            .set_override_option("full_name", args.full_name.clone())?
            .set_override_option("backend.kind", args.backend.map(|kind| kind.as_str()))?
            .set_override_option("backend.path", args.sqlite_path.clone())?
            .set_override_option("backend.base_url", args.base_url.clone())?
            .set_override_option("backend.api_key", args.api_key.clone())?
            .set_override_option("backend.access_token", args.access_token.clone())?
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
