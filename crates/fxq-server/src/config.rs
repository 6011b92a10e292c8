//! Downstream server configuration.

use serde::{Deserialize, Serialize};

/// Downstream server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Maximum concurrent downstream WebSocket connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// Messages queued per client before broadcasts to it are dropped.
    #[serde(default = "default_client_buffer")]
    pub client_buffer: usize,
}

fn default_bind() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5001
}

fn default_max_connections() -> usize {
    1000
}

fn default_client_buffer() -> usize {
    256
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
            max_connections: default_max_connections(),
            client_buffer: default_client_buffer(),
        }
    }
}

impl ServerConfig {
    /// `bind:port` as a socket address string.
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind, self.port)
    }
}
