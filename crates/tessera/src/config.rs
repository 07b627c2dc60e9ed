//! Command line configuration.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `TESSERA_DATABASE` | tessera.db | SQLite file (`:memory:` for a scratch store) |
//! | `TESSERA_REMOTE_URL` | - | Base URL of a remote provider; replaces the database |
//! | `TESSERA_REMOTE_TIMEOUT` | 30 | Remote request timeout (seconds) |
//! | `TESSERA_TENANT` | default | Tenant every command runs in |
//! | `TESSERA_USER` | - | User id attached to every request |
//! | `TESSERA_LOG_LEVEL` | warn | Log level |

use std::fmt;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};

/// Inspect and edit tessera entities.
#[derive(Debug, Clone, Parser)]
#[command(name = "tessera", version)]
#[command(about = "Inspect and edit entities in a tessera store")]
pub struct CliConfig {
    /// SQLite database file.
    #[arg(long, env = "TESSERA_DATABASE")]
    pub database: Option<String>,

    /// Base URL of a remote provider.
    #[arg(long, env = "TESSERA_REMOTE_URL")]
    pub remote: Option<String>,

    /// Remote request timeout in seconds.
    #[arg(long, env = "TESSERA_REMOTE_TIMEOUT", default_value = "30")]
    pub timeout: u64,

    /// Tenant the command runs in.
    #[arg(long, env = "TESSERA_TENANT")]
    pub tenant: Option<String>,

    /// User id sent with every request.
    #[arg(long, env = "TESSERA_USER")]
    pub user: Option<String>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(long, env = "TESSERA_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print one entity in its full projection.
    Get {
        kind: Kind,
        id: String,

        /// Include entities in any state.
        #[arg(long)]
        all: bool,
    },

    /// Print a page of entities, e.g. `order=name&count=5` or a bare name.
    Search { kind: Kind, query: Option<String> },

    /// Create an entity or patch an existing one from a JSON object.
    Put {
        kind: Kind,
        json: String,

        /// Id of the entity; defaults to the body's `id` or a new one.
        #[arg(long)]
        id: Option<String>,

        /// Fail unless the stored revision matches.
        #[arg(long = "if-match")]
        revision: Option<String>,

        /// Fail if an entity is already stored under the id.
        #[arg(long, conflicts_with = "revision")]
        create: bool,
    },

    /// Mark an entity deleted.
    Delete { kind: Kind, id: String },

    /// Print the revisions recorded for a content item.
    Revisions {
        source_id: String,
        query: Option<String>,
    },
}

/// Entity kinds the CLI can address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Kind {
    User,
    Group,
    Membership,
    Content,
    ContentRevision,
    Comment,
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_possible_value() {
            Some(value) => f.write_str(value.get_name()),
            None => write!(f, "{self:?}"),
        }
    }
}

/// Where providers read and write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendMode {
    Sqlite { path: String },
    Remote { base_url: String, timeout: Duration },
}

impl fmt::Display for BackendMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendMode::Sqlite { path } => write!(f, "sqlite:{path}"),
            BackendMode::Remote { base_url, .. } => f.write_str(base_url),
        }
    }
}

impl CliConfig {
    /// Validates the configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.database.is_some() && self.remote.is_some() {
            errors.push("--database and --remote cannot be combined".to_string());
        }

        if self.timeout == 0 {
            errors.push("Remote timeout cannot be 0".to_string());
        }

        if let Some(url) = &self.remote {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("Remote URL must be http(s): {url}"));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    pub fn backend_mode(&self) -> BackendMode {
        match &self.remote {
            Some(base_url) => BackendMode::Remote {
                base_url: base_url.clone(),
                timeout: Duration::from_secs(self.timeout),
            },
            None => BackendMode::Sqlite {
                path: self
                    .database
                    .clone()
                    .unwrap_or_else(|| "tessera.db".to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> CliConfig {
        CliConfig::try_parse_from(std::iter::once("tessera").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_defaults_to_local_file() {
        let config = parse(&["get", "user", "ada"]);
        assert!(config.validate().is_ok());
        assert_eq!(
            config.backend_mode(),
            BackendMode::Sqlite {
                path: "tessera.db".to_string()
            }
        );
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_remote_mode() {
        let config = parse(&[
            "--remote",
            "http://localhost:8080/api",
            "--timeout",
            "5",
            "search",
            "content",
            "q=news",
        ]);
        assert_eq!(
            config.backend_mode(),
            BackendMode::Remote {
                base_url: "http://localhost:8080/api".to_string(),
                timeout: Duration::from_secs(5),
            }
        );
        match config.command {
            Command::Search { kind, query } => {
                assert_eq!(kind, Kind::Content);
                assert_eq!(query.as_deref(), Some("q=news"));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_kind_names() {
        let config = parse(&["delete", "content-revision", "r1"]);
        match config.command {
            Command::Delete { kind, .. } => assert_eq!(kind.to_string(), "content-revision"),
            other => panic!("unexpected command {other:?}"),
        }
        assert!(CliConfig::try_parse_from(["tessera", "get", "widget", "x"]).is_err());
    }

    #[test]
    fn test_create_and_if_match_exclude_each_other() {
        let config = parse(&["put", "user", "{}", "--create"]);
        match config.command {
            Command::Put { create, revision, .. } => {
                assert!(create);
                assert!(revision.is_none());
            }
            other => panic!("unexpected command {other:?}"),
        }
        let both = ["tessera", "put", "user", "{}", "--create", "--if-match", "r1"];
        assert!(CliConfig::try_parse_from(both).is_err());
    }

    #[test]
    fn test_validate_collects_errors() {
        let config = parse(&[
            "--database",
            "a.db",
            "--remote",
            "ftp://example.com",
            "--timeout",
            "0",
            "revisions",
            "post",
        ]);
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
    }
}
