//! Configuration for starting a mock server.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};

use crate::http::server::MockServer;

/// Settings a mock server is started with.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the listener binds to
    pub listen: SocketAddr,
    /// Client used for passthrough calls to the real network
    pub passthrough_client: reqwest::Client,
}

/// Builder for constructing a [`MockServer`] with fluent interface.
///
/// This builder follows the Builder pattern to provide a clean, fluent interface
/// for constructing the server configuration with optional parameters.
#[derive(Debug, Default)]
pub struct MockServerBuilder {
    listen: Option<SocketAddr>,
    passthrough_client: Option<reqwest::Client>,
}

impl MockServerBuilder {
    /// Create a new builder with default values.
    ///
    /// # Returns
    ///
    /// Returns a new `MockServerBuilder` instance.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the listen address.
    ///
    /// # Parameters
    ///
    /// - `listen` - Address to bind; port `0` picks a free port
    ///
    /// # Returns
    ///
    /// Returns the builder for method chaining.
    pub fn with_listen(mut self, listen: SocketAddr) -> Self {
        self.listen = Some(listen);
        self
    }

    /// Set the client used for passthrough requests.
    ///
    /// # Parameters
    ///
    /// - `client` - Client that talks to the real network
    ///
    /// # Returns
    ///
    /// Returns the builder for method chaining.
    pub fn with_passthrough_client(mut self, client: reqwest::Client) -> Self {
        self.passthrough_client = Some(client);
        self
    }

    /// Build the final configuration.
    ///
    /// # Returns
    ///
    /// Returns `Ok(ServerConfig)` with defaults filled in: a loopback address
    /// on a free port and a fresh passthrough client.
    ///
    /// # Errors
    ///
    /// Returns error if the default passthrough client cannot be created.
    pub fn build(self) -> io::Result<ServerConfig> {
        let listen = self.listen.unwrap_or_else(|| SocketAddr::from((Ipv4Addr::LOCALHOST, 0)));

        let passthrough_client = match self.passthrough_client {
            Some(client) => client,
            None => reqwest::Client::builder().build().map_err(io::Error::other)?,
        };

        Ok(ServerConfig { listen, passthrough_client })
    }

    /// Build the configuration and start listening.
    ///
    /// # Errors
    ///
    /// Returns error if the configuration is invalid or the address cannot be bound.
    pub async fn start(self) -> io::Result<MockServer> {
        MockServer::with_config(self.build()?).await
    }
}
