//! Client-side connection establishment.
//!
//! # Architecture
//!
//! ```text
//! Connection::connect(config)
//!   ├── TcpStream::connect (connection_timeout)
//!   └── HandshakeMachine (handshake_timeout)
//!         ├── protocol::codec (request/response bytes)
//!         └── protocol::status (rejection classification)
//! ```

pub mod config;
pub mod connection;
pub mod error;

pub use config::{ClientConfig, ClientConfigBuilder, DEFAULT_PORT};
pub use connection::Connection;
pub use error::{ClientError, ClientResult};
