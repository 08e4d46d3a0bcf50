//! Startup configuration.
//!
//! Every setting is resolved once, at process start, from a CLI flag or its
//! environment variable (flag wins), and the resulting [`Config`] is passed by
//! reference into the dispatcher and the transport selector.
//!
//! | Flag                    | Environment          | Default          |
//! |-------------------------|----------------------|------------------|
//! | `--perplexity-api-key`  | `PERPLEXITY_API_KEY` | unset            |
//! | `--mode`                | `MODE`               | `stdio`          |
//! | `--host`                | `HOST`               | `0.0.0.0`        |
//! | `--port`                | `PORT`               | `9593`           |
//! | `--endpoint`            | `ENDPOINT`           | `/rest`          |
//! | `--workers`             | `WORKER_THREADS`     | CPU count (≤ 16) |
//! | `--server-name`         | `SERVER_NAME`        | crate name       |
//! | `--server-version`      | `SERVER_VERSION`     | crate version    |

use clap::{Parser, ValueEnum};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 9593;
pub const DEFAULT_ENDPOINT: &str = "/rest";

/// Upper bound on HTTP worker threads when none are configured.
const MAX_DEFAULT_WORKERS: usize = 16;

/// Transport the server binds to. Chosen once, never re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum Mode {
    /// Newline-delimited JSON-RPC over stdin/stdout.
    #[default]
    Stdio,
    /// JSON-RPC POSTed to an HTTP endpoint.
    Rest,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "daily-todo-mcp", about = "MCP server exposing a daily to-do list tool", version)]
pub struct Config {
    /// API key checked before any tool call. Requests may carry their own instead.
    #[arg(long, env = "PERPLEXITY_API_KEY", hide_env_values = true)]
    pub perplexity_api_key: Option<String>,

    /// Transport mode
    #[arg(long, env = "MODE", value_enum, default_value_t = Mode::Stdio)]
    pub mode: Mode,

    /// Bind address for rest mode
    #[arg(long, env = "HOST", default_value = DEFAULT_HOST)]
    pub host: String,

    /// Port for rest mode
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Path the JSON-RPC endpoint is served at in rest mode
    #[arg(long, env = "ENDPOINT", default_value = DEFAULT_ENDPOINT, value_parser = parse_endpoint)]
    pub endpoint: String,

    /// HTTP worker threads (defaults to the CPU count, capped at 16)
    #[arg(long, env = "WORKER_THREADS")]
    pub workers: Option<usize>,

    /// Server name reported in `initialize`
    #[arg(long, env = "SERVER_NAME", default_value = env!("CARGO_PKG_NAME"))]
    pub server_name: String,

    /// Server version reported in `initialize`
    #[arg(long, env = "SERVER_VERSION", default_value = env!("CARGO_PKG_VERSION"))]
    pub server_version: String,
}

impl Config {
    /// Configured API key, treating an empty value as unset.
    pub fn api_key(&self) -> Option<&str> {
        self.perplexity_api_key.as_deref().filter(|key| !key.is_empty())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|&n| n > 0)
            .unwrap_or_else(|| num_cpus::get().clamp(1, MAX_DEFAULT_WORKERS))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            perplexity_api_key: None,
            mode: Mode::default(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            workers: None,
            server_name: env!("CARGO_PKG_NAME").to_string(),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Endpoint paths are normalized to start with a single `/`.
fn parse_endpoint(raw: &str) -> Result<String, String> {
    let trimmed = raw.trim().trim_start_matches('/');
    if trimmed.chars().any(char::is_whitespace) {
        return Err(format!("endpoint must not contain whitespace: {raw:?}"));
    }
    Ok(format!("/{trimmed}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_stdio_on_documented_port() {
        let config = Config::default();
        assert_eq!(config.mode, Mode::Stdio);
        assert_eq!(config.port, 9593);
        assert_eq!(config.endpoint, "/rest");
        assert!(config.api_key().is_none());
    }

    #[test]
    fn explicit_flags_select_rest_listener() {
        let config = Config::try_parse_from([
            "daily-todo-mcp",
            "--mode",
            "rest",
            "--port",
            "8123",
            "--endpoint",
            "/mcp/v1",
            "--host",
            "127.0.0.1",
        ])
        .unwrap();
        assert_eq!(config.mode, Mode::Rest);
        assert_eq!(config.bind_addr(), "127.0.0.1:8123");
        assert_eq!(config.endpoint, "/mcp/v1");
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let result = Config::try_parse_from(["daily-todo-mcp", "--mode", "websocket"]);
        assert!(result.is_err());
    }

    #[test]
    fn endpoint_gets_leading_slash() {
        assert_eq!(parse_endpoint("rest").unwrap(), "/rest");
        assert_eq!(parse_endpoint("//api").unwrap(), "/api");
        assert!(parse_endpoint("a b").is_err());
    }

    #[test]
    fn empty_api_key_counts_as_unset() {
        let config = Config {
            perplexity_api_key: Some(String::new()),
            ..Config::default()
        };
        assert!(config.api_key().is_none());
    }

    #[test]
    fn zero_workers_falls_back_to_cpu_count() {
        let config = Config {
            workers: Some(0),
            ..Config::default()
        };
        assert!((1..=MAX_DEFAULT_WORKERS).contains(&config.worker_count()));
        let config = Config {
            workers: Some(3),
            ..Config::default()
        };
        assert_eq!(config.worker_count(), 3);
    }
}
