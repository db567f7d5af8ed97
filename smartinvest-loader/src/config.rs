//! Loader and warehouse configuration.
//!
//! Two layers:
//! - [`WarehouseConfig`]: connection parameters from the environment
//!   (a `.env` file in the working directory is read first).
//! - [`LoaderConfig`]: everything else, from an optional TOML file. Every
//!   field has a default, so running without a file is the common case.

use crate::orchestrator::FailurePolicy;
use crate::upsert::MergePolicy;
use serde::{Deserialize, Serialize};
use smartinvest_core::domain::Domain;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required credential {0} (set it in the environment or .env)")]
    MissingCredential(&'static str),

    #[error("invalid {var} '{value}': expected a port number")]
    InvalidPort { var: &'static str, value: String },

    #[error("failed to read config {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{domain} source directory not found: {} (run the {domain} ingestion first)", .path.display())]
    MissingSourceDir { domain: Domain, path: PathBuf },

    #[error("invalid namespace '{0}': expected letters, digits and underscores, not starting with a digit")]
    InvalidNamespace(String),

    #[error("sqlite backend has no path; a load into an in-memory warehouse would be discarded")]
    EphemeralBackend,
}

pub const DB_HOST: &str = "DB_HOST";
pub const DB_PORT: &str = "DB_PORT";
pub const DB_NAME: &str = "DB_NAME";
pub const DB_USER: &str = "DB_USER";
pub const DB_PASSWORD: &str = "DB_PASSWORD";

/// Postgres connection parameters.
#[derive(Clone, PartialEq, Eq)]
pub struct WarehouseConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl fmt::Debug for WarehouseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WarehouseConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl WarehouseConfig {
    /// Read from the process environment after loading `.env`, if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Some(e) = dotenv_problem(dotenvy::dotenv()) {
            warn!(error = %e, "ignoring unreadable .env");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Resolve every variable through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let password = get(DB_PASSWORD).ok_or(ConfigError::MissingCredential(DB_PASSWORD))?;
        let port = match get(DB_PORT) {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidPort {
                var: DB_PORT,
                value: raw,
            })?,
            None => 5432,
        };

        Ok(Self {
            host: get(DB_HOST).unwrap_or_else(|| "localhost".into()),
            port,
            database: get(DB_NAME).unwrap_or_else(|| "smartinvest_dw".into()),
            user: get(DB_USER).unwrap_or_else(|| "postgres".into()),
            password,
        })
    }
}

/// A missing `.env` is normal; real variables still apply.
fn dotenv_problem<T>(result: Result<T, dotenvy::Error>) -> Option<dotenvy::Error> {
    match result {
        Err(e) if !e.not_found() => Some(e),
        _ => None,
    }
}

/// Postgres identifier limit.
const MAX_NAMESPACE_LEN: usize = 63;

/// The namespace is spliced into DDL and DML unquoted, so only plain
/// identifiers are accepted. Empty means no schema prefix.
pub fn validate_namespace(namespace: &str) -> Result<(), ConfigError> {
    let mut chars = namespace.chars();
    let valid = match chars.next() {
        None => true,
        Some(first) => {
            (first.is_ascii_alphabetic() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
                && namespace.len() <= MAX_NAMESPACE_LEN
        }
    };
    if valid {
        Ok(())
    } else {
        Err(ConfigError::InvalidNamespace(namespace.to_string()))
    }
}

/// Which store the loader writes to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Backend {
    #[default]
    Postgres,
    /// Embedded SQLite file; in memory when `path` is omitted.
    Sqlite {
        #[serde(default)]
        path: Option<PathBuf>,
    },
}

impl Backend {
    /// True when nothing written survives the process.
    pub fn is_ephemeral(&self) -> bool {
        matches!(self, Backend::Sqlite { path: None })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Hand-off directory for market batches.
    pub market_dir: PathBuf,
    /// Hand-off directory for macro batches.
    pub macro_dir: PathBuf,
    /// Warehouse schema name (Postgres only).
    pub namespace: String,
    pub merge_policy: MergePolicy,
    pub failure_policy: FailurePolicy,
    pub backend: Backend,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            market_dir: PathBuf::from("data/raw/yfinance"),
            macro_dir: PathBuf::from("data/raw/fred"),
            namespace: "smartinvest".into(),
            merge_policy: MergePolicy::default(),
            failure_policy: FailurePolicy::default(),
            backend: Backend::default(),
        }
    }
}

impl LoaderConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that parsing alone can't express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_namespace(&self.namespace)
    }

    /// Loads must land somewhere that outlives the run.
    pub fn require_persistent_backend(&self) -> Result<&Backend, ConfigError> {
        if self.backend.is_ephemeral() {
            Err(ConfigError::EphemeralBackend)
        } else {
            Ok(&self.backend)
        }
    }

    pub fn source_dir(&self, domain: Domain) -> &Path {
        match domain {
            Domain::Market => &self.market_dir,
            Domain::Macro => &self.macro_dir,
        }
    }

    /// Fails when the domain's hand-off directory does not exist.
    pub fn require_source_dir(&self, domain: Domain) -> Result<&Path, ConfigError> {
        let dir = self.source_dir(domain);
        if dir.is_dir() {
            Ok(dir)
        } else {
            Err(ConfigError::MissingSourceDir {
                domain,
                path: dir.to_path_buf(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_fill_everything_but_password() {
        let cfg = WarehouseConfig::from_lookup(lookup(&[(DB_PASSWORD, "secret")])).unwrap();
        assert_eq!(cfg.host, "localhost");
        assert_eq!(cfg.port, 5432);
        assert_eq!(cfg.database, "smartinvest_dw");
        assert_eq!(cfg.user, "postgres");
        assert_eq!(cfg.password, "secret");
    }

    #[test]
    fn missing_or_blank_password_is_rejected() {
        let err = WarehouseConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(DB_PASSWORD)));

        let err = WarehouseConfig::from_lookup(lookup(&[(DB_PASSWORD, "  ")])).unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(_)));
    }

    #[test]
    fn bad_port_is_rejected() {
        let err = WarehouseConfig::from_lookup(lookup(&[(DB_PASSWORD, "x"), (DB_PORT, "pg")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPort { value, .. } if value == "pg"));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let cfg = WarehouseConfig::from_lookup(lookup(&[
            (DB_PASSWORD, "x"),
            (DB_HOST, "db.internal"),
            (DB_PORT, "6543"),
            (DB_NAME, "dw"),
            (DB_USER, "loader"),
        ]))
        .unwrap();
        assert_eq!(cfg.host, "db.internal");
        assert_eq!(cfg.port, 6543);
        assert_eq!(cfg.database, "dw");
        assert_eq!(cfg.user, "loader");
    }

    #[test]
    fn debug_redacts_password() {
        let cfg = WarehouseConfig::from_lookup(lookup(&[(DB_PASSWORD, "hunter2")])).unwrap();
        let shown = format!("{cfg:?}");
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("<redacted>"));
    }

    #[test]
    fn empty_toml_is_all_defaults() {
        assert_eq!(LoaderConfig::from_toml("").unwrap(), LoaderConfig::default());
    }

    #[test]
    fn toml_overrides() {
        let cfg = LoaderConfig::from_toml(
            r#"
            market_dir = "/srv/yf"
            merge_policy = "patch"
            failure_policy = "abort"

            [backend]
            type = "sqlite"
            path = "warehouse.db"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.market_dir, PathBuf::from("/srv/yf"));
        assert_eq!(cfg.macro_dir, PathBuf::from("data/raw/fred"));
        assert_eq!(cfg.merge_policy, MergePolicy::Patch);
        assert_eq!(cfg.failure_policy, FailurePolicy::Abort);
        assert_eq!(
            cfg.backend,
            Backend::Sqlite {
                path: Some(PathBuf::from("warehouse.db"))
            }
        );
    }

    #[test]
    fn unknown_policy_is_parse_error() {
        let err = LoaderConfig::from_toml("merge_policy = \"sometimes\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn from_file_reads_toml() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("loader.toml");
        std::fs::write(&path, "namespace = \"staging\"\n").unwrap();
        assert_eq!(LoaderConfig::from_file(&path).unwrap().namespace, "staging");
        assert!(matches!(
            LoaderConfig::from_file(&tmp.path().join("nope.toml")).unwrap_err(),
            ConfigError::Read { .. }
        ));
    }

    #[test]
    fn namespace_must_be_plain_identifier() {
        for ok in ["smartinvest", "staging_2", "_scratch", ""] {
            assert!(validate_namespace(ok).is_ok(), "{ok}");
        }
        for bad in ["dw; DROP TABLE x", "2024", "dw.facts", "\"dw\"", "smart-invest"] {
            assert!(
                matches!(validate_namespace(bad), Err(ConfigError::InvalidNamespace(ref n)) if n == bad),
                "{bad}"
            );
        }
        assert!(validate_namespace(&"n".repeat(64)).is_err());

        let err = LoaderConfig::from_toml("namespace = \"dw; DROP SCHEMA public\"").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNamespace(_)));
        assert_eq!(
            LoaderConfig::from_toml("namespace = \"staging_2\"").unwrap().namespace,
            "staging_2"
        );
    }

    #[test]
    fn sqlite_without_path_is_ephemeral() {
        let cfg = LoaderConfig::from_toml("[backend]\ntype = \"sqlite\"\n").unwrap();
        assert!(cfg.backend.is_ephemeral());
        assert!(matches!(
            cfg.require_persistent_backend().unwrap_err(),
            ConfigError::EphemeralBackend
        ));

        let file = LoaderConfig {
            backend: Backend::Sqlite {
                path: Some(PathBuf::from("warehouse.db")),
            },
            ..LoaderConfig::default()
        };
        assert!(file.require_persistent_backend().is_ok());
        assert!(LoaderConfig::default().require_persistent_backend().is_ok());
    }

    #[test]
    fn dotenv_only_tolerates_absence() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(dotenv_problem(dotenvy::from_path(tmp.path().join(".env"))).is_none());

        let malformed = tmp.path().join("malformed.env");
        std::fs::write(&malformed, "NOT A VALID LINE\n").unwrap();
        assert!(dotenv_problem(dotenvy::from_path(&malformed)).is_some());
    }

    #[test]
    fn missing_source_dir_is_config_error() {
        let tmp = tempfile::tempdir().unwrap();
        let cfg = LoaderConfig {
            market_dir: tmp.path().to_path_buf(),
            macro_dir: tmp.path().join("fred"),
            ..LoaderConfig::default()
        };
        assert_eq!(cfg.require_source_dir(Domain::Market).unwrap(), tmp.path());
        assert!(matches!(
            cfg.require_source_dir(Domain::Macro).unwrap_err(),
            ConfigError::MissingSourceDir {
                domain: Domain::Macro,
                ..
            }
        ));
    }
}
