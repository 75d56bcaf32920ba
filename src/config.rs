use std::{env, net::SocketAddr, path::PathBuf};

use thiserror::Error;

pub const DEFAULT_USERS_DB_PATH: &str = "data/users.db";
pub const DEFAULT_ETF_DB_PATH: &str = "data/etfs.db";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Stdio,
    Http,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub transport: Transport,
    pub users_db_path: PathBuf,
    pub etf_db_path: PathBuf,
    pub bind_addr: String,
    pub bind_port: u16,
    pub api_token: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("MCP_TRANSPORT must be one of: stdio, http")]
    InvalidTransport,
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let transport = match env::var("MCP_TRANSPORT")
            .ok()
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty())
            .as_deref()
        {
            None | Some("stdio") => Transport::Stdio,
            Some("http") | Some("sse") => Transport::Http,
            _ => return Err(ConfigError::InvalidTransport),
        };

        let users_db_path = path_var("USERS_DB_PATH", DEFAULT_USERS_DB_PATH);
        let etf_db_path = path_var("ETF_DB_PATH", DEFAULT_ETF_DB_PATH);

        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(8080);
        let api_token = env::var("MCP_API_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        let config = Self {
            transport,
            users_db_path,
            etf_db_path,
            bind_addr,
            bind_port,
            api_token,
        };

        if config.transport == Transport::Http {
            let _ = config.bind_socket()?;
        }
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

fn path_var(name: &str, default: &str) -> PathBuf {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}
