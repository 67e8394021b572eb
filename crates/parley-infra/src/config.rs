//! Configuration loader for Parley.
//!
//! Reads an optional `parley.toml` into [`AppConfig`], then applies
//! environment variable overrides. A missing file means defaults; a file
//! that exists but does not parse is an error, since silently ignoring a
//! broken deployment config would start the server against the wrong
//! database.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use parley_types::config::AppConfig;
use secrecy::SecretString;
use thiserror::Error;

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "parley.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: '{value}'")]
    InvalidEnv { var: &'static str, value: String },
}

/// Load configuration from `path` (or `parley.toml`) and the process environment.
pub async fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
    let config = load_file(path).await?;
    apply_env_overrides(config, |var| std::env::var(var).ok())
}

/// Parse the TOML file at `path`; a missing file yields defaults.
pub async fn load_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let content = match tokio::fs::read_to_string(path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(AppConfig::default());
        }
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Apply environment overrides using `lookup` to read variables.
///
/// `DATABASE_URL` sets the full URL. The discrete `DB_*` variables fill the
/// PostgreSQL fields used when no URL is set. Empty values are ignored.
pub fn apply_env_overrides<F>(mut config: AppConfig, lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |var: &str| lookup(var).filter(|v| !v.trim().is_empty());

    if let Some(env) = get("ENV") {
        config.env = env;
    }

    if let Some(host) = get("SERVER_HOST") {
        config.server.host = host;
    }
    if let Some(port) = parse_var(&get, "SERVER_PORT")? {
        config.server.port = port;
    }

    let db = &mut config.database;
    if let Some(url) = get("DATABASE_URL") {
        db.url = Some(url);
    }
    if let Some(host) = get("DB_HOST") {
        db.host = Some(host);
    }
    if let Some(port) = parse_var(&get, "DB_PORT")? {
        db.port = port;
    }
    if let Some(user) = get("DB_USER") {
        db.user = user;
    }
    if let Some(password) = get("DB_PASSWORD") {
        db.password = password;
    }
    if let Some(name) = get("DB_NAME") {
        db.name = name;
    }
    if let Some(ssl_mode) = get("DB_SSL_MODE") {
        db.ssl_mode = ssl_mode;
    }

    if let Some(script) = get("BOOTSTRAP_SCRIPT") {
        config.bootstrap.script_path = Some(PathBuf::from(script));
    }
    if let Some(secs) = parse_var(&get, "BOOTSTRAP_TIMEOUT_SECS")? {
        config.bootstrap.timeout_secs = secs;
    }

    if let Some(base_url) = get("LLM_BASE_URL") {
        config.llm.base_url = base_url;
    }
    if let Some(model) = get("LLM_MODEL") {
        config.llm.model = model;
    }
    if let Some(key) = get("LLM_API_KEY") {
        config.llm.api_key = Some(SecretString::from(key));
    }
    if let Some(secs) = parse_var(&get, "LLM_TIMEOUT_SECS")? {
        config.llm.timeout_secs = secs;
    }

    Ok(config)
}

fn parse_var<T, G>(get: &G, var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidEnv { var, value }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::*;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |var| map.get(var).cloned()
    }

    #[tokio::test]
    async fn test_missing_file_returns_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = load_file(&tmp.path().join("parley.toml")).await.unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.llm.model, "gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_valid_file_is_parsed() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("parley.toml");
        tokio::fs::write(
            &path,
            r#"
[server]
port = 9001

[llm]
model = "gpt-4.1-mini"
"#,
        )
        .await
        .unwrap();

        let config = load_file(&path).await.unwrap();
        assert_eq!(config.server.port, 9001);
        assert_eq!(config.llm.model, "gpt-4.1-mini");
    }

    #[tokio::test]
    async fn test_invalid_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("parley.toml");
        tokio::fs::write(&path, "this is not { valid toml !!!")
            .await
            .unwrap();

        let err = load_file(&path).await.unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_env_overrides() {
        let config = apply_env_overrides(
            AppConfig::default(),
            env(&[
                ("ENV", "production"),
                ("SERVER_HOST", "0.0.0.0"),
                ("SERVER_PORT", "3000"),
                ("BOOTSTRAP_SCRIPT", "/srv/init.sql"),
                ("BOOTSTRAP_TIMEOUT_SECS", "15"),
                ("LLM_BASE_URL", "http://llm:4000/v1"),
                ("LLM_MODEL", "gpt-4.1"),
                ("LLM_API_KEY", "sk-secret"),
                ("LLM_TIMEOUT_SECS", "12"),
            ]),
        )
        .unwrap();

        assert_eq!(config.env, "production");
        assert_eq!(config.server.address(), "0.0.0.0:3000");
        assert_eq!(
            config.bootstrap.script_path,
            Some(PathBuf::from("/srv/init.sql"))
        );
        assert_eq!(config.bootstrap.timeout_secs, 15);
        assert_eq!(config.llm.base_url, "http://llm:4000/v1");
        assert_eq!(config.llm.model, "gpt-4.1");
        assert_eq!(config.llm.timeout_secs, 12);
        assert_eq!(
            config.llm.api_key.as_ref().unwrap().expose_secret(),
            "sk-secret"
        );
    }

    #[test]
    fn test_discrete_db_vars_build_postgres_url() {
        let config = apply_env_overrides(
            AppConfig::default(),
            env(&[
                ("DB_HOST", "db"),
                ("DB_PORT", "6543"),
                ("DB_USER", "app"),
                ("DB_PASSWORD", "pw"),
                ("DB_NAME", "parley"),
                ("DB_SSL_MODE", "require"),
            ]),
        )
        .unwrap();

        assert_eq!(
            config.database.database_url(),
            "postgres://app:pw@db:6543/parley?sslmode=require"
        );
    }

    #[test]
    fn test_database_url_wins() {
        let config = apply_env_overrides(
            AppConfig::default(),
            env(&[
                ("DATABASE_URL", "sqlite://override.db"),
                ("DB_HOST", "db"),
            ]),
        )
        .unwrap();
        assert_eq!(config.database.database_url(), "sqlite://override.db");
    }

    #[test]
    fn test_empty_values_are_ignored() {
        let config =
            apply_env_overrides(AppConfig::default(), env(&[("SERVER_PORT", "  "), ("ENV", "")]))
                .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.env, "development");
    }

    #[test]
    fn test_unparseable_number_is_an_error() {
        let err = apply_env_overrides(AppConfig::default(), env(&[("SERVER_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidEnv {
                var: "SERVER_PORT",
                ..
            }
        ));
    }
}
