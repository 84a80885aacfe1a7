use serde::Deserialize;
use std::{env, fs, io::ErrorKind, sync::Arc};
use thiserror::Error;

use crate::storage::{FileStore, KvStore, MemoryStore, RestKvStore, StorageError};

const DEFAULT_PATH: &str = "wall.toml";

#[derive(Deserialize, Debug)]
#[serde(default)]
pub struct Config {
    pub listen_addr: String,
    pub verbosity: String,
    pub templates: String,
    pub static_dir: String,
    pub backend: Backend,
}

#[derive(Deserialize, Debug, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Backend {
    File {
        #[serde(default = "default_data_dir")]
        data_dir: String,
    },
    Kv {
        #[serde(default)]
        url: String,
        #[serde(default)]
        token: String,
    },
    Memory,
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            listen_addr: "127.0.0.1:8000".to_string(),
            verbosity: "info".to_string(),
            templates: "templates/*.html".to_string(),
            static_dir: "static".to_string(),
            backend: Backend::File {
                data_dir: default_data_dir(),
            },
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Toml(#[from] toml::de::Error),
    #[error("kv backend needs a url and a token (KV_REST_API_URL / KV_REST_API_TOKEN)")]
    MissingKvCredentials,
    #[error("{0}")]
    Backend(#[from] StorageError),
}

impl Config {
    /// Reads `$WALL_CONFIG`, or `wall.toml` when unset. A missing file
    /// yields the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        let path = env::var("WALL_CONFIG").unwrap_or_else(|_| DEFAULT_PATH.to_string());
        let mut config = match fs::read_to_string(&path) {
            Ok(conf_str) => Config::parse(&conf_str)?,
            Err(e) if e.kind() == ErrorKind::NotFound => Config::default(),
            Err(e) => return Err(e.into()),
        };
        config.apply_env(|name| env::var(name).ok());
        Ok(config)
    }

    pub fn parse(conf_str: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(conf_str)?)
    }

    /// Hosted KV credentials may come from the environment, which wins over
    /// the file.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Backend::Kv { url, token } = &mut self.backend {
            if let Some(v) = lookup("KV_REST_API_URL") {
                *url = v;
            }
            if let Some(v) = lookup("KV_REST_API_TOKEN") {
                *token = v;
            }
        }
    }

    pub fn build_backend(&self) -> Result<Arc<dyn KvStore>, ConfigError> {
        Ok(match &self.backend {
            Backend::File { data_dir } => Arc::new(FileStore::new(data_dir)),
            Backend::Kv { url, token } => {
                if url.is_empty() || token.is_empty() {
                    return Err(ConfigError::MissingKvCredentials);
                }
                Arc::new(RestKvStore::new(url, token)?)
            }
            Backend::Memory => Arc::new(MemoryStore::new()),
        })
    }

    pub fn log_level(&self) -> log::LevelFilter {
        self.verbosity.parse().unwrap_or(log::LevelFilter::Info)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:8000");
        assert_eq!(
            config.backend,
            Backend::File {
                data_dir: "data".to_string()
            }
        );
        assert_eq!(config.log_level(), log::LevelFilter::Info);
    }

    #[test]
    fn parses_kv_backend() {
        let config = Config::parse(
            r#"
            listen_addr = "0.0.0.0:9000"
            verbosity = "debug"

            [backend]
            kind = "kv"
            url = "https://kv.example.com"
            token = "secret"
            "#,
        )
        .unwrap();
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(config.log_level(), log::LevelFilter::Debug);
        assert_eq!(
            config.backend,
            Backend::Kv {
                url: "https://kv.example.com".to_string(),
                token: "secret".to_string()
            }
        );
        assert_eq!(config.build_backend().unwrap().name(), "kv");
    }

    #[test]
    fn env_overrides_kv_credentials() {
        let mut config = Config::parse("[backend]\nkind = \"kv\"\n").unwrap();
        assert!(matches!(
            config.build_backend(),
            Err(ConfigError::MissingKvCredentials)
        ));

        config.apply_env(|name| match name {
            "KV_REST_API_URL" => Some("https://env.example.com".to_string()),
            "KV_REST_API_TOKEN" => Some("envtoken".to_string()),
            _ => None,
        });
        assert_eq!(
            config.backend,
            Backend::Kv {
                url: "https://env.example.com".to_string(),
                token: "envtoken".to_string()
            }
        );
    }

    #[test]
    fn malformed_kv_url_is_a_config_error() {
        let config =
            Config::parse("[backend]\nkind = \"kv\"\nurl = \"nope\"\ntoken = \"t\"\n").unwrap();
        assert!(matches!(
            config.build_backend(),
            Err(ConfigError::Backend(_))
        ));
    }

    #[test]
    fn env_is_ignored_for_other_backends() {
        let mut config = Config::parse("[backend]\nkind = \"memory\"\n").unwrap();
        config.apply_env(|_| Some("x".to_string()));
        assert_eq!(config.backend, Backend::Memory);
        assert_eq!(config.build_backend().unwrap().name(), "memory");
    }

    #[test]
    fn rejects_unknown_backend() {
        assert!(matches!(
            Config::parse("[backend]\nkind = \"redis\"\n"),
            Err(ConfigError::Toml(_))
        ));
    }
}
