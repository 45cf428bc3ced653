//! Mock listener, client-side interception and passthrough forwarding.

pub(crate) mod connection;
pub mod intercept;
pub mod passthrough;
pub mod server;
pub mod state;

pub use intercept::{InterceptError, InterceptingClient, Redirect};
pub use passthrough::Passthrough;
pub use server::{MockServer, LOCALHOST};
pub use state::{MockServerBuilder, ServerConfig};
