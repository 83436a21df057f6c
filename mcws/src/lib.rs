//! Client for the JRiver Media Center web service (MCWS).
//!
//! [`connection`] speaks the raw MCWS protocol: HTTP requests whose responses are small XML (or
//! occasionally JSON) documents. [`MediaServer`] builds a typed interface for controlling
//! playback and browsing the library on top of it.
//!
//! ```ignore
//! let mut ms = MediaServer::new(connection::Options::new("localhost", 52199).connect()?);
//! let info = ms.alive().await?;
//! for zone in ms.get_zones().await? {
//!     println!("{zone}: {}", ms.get_playback_info(Some(&zone), &["Genre"]).await?);
//! }
//! ```

pub mod connection;
pub mod domain;
pub mod error;
pub mod server;
pub mod testing;

pub use connection::{Connection, Options};
pub use domain::{
    Key, KeyCommand, LibraryField, MediaServerInfo, MediaSubType, MediaType, PlaybackInfo,
    PlaybackState, ViewMode, Zone,
};
pub use error::Error;
pub use server::MediaServer;

use tracing_subscriber::EnvFilter;

/// Install a global logger which respects `RUST_LOG`.
///
/// Safe to call more than once; only the first call has any effect.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

/// Connect to the media server at `host:port`.
///
/// Credentials are only sent if `username` is given.
pub fn get_mcws_connection(
    host: impl Into<String>,
    port: u16,
    username: Option<String>,
    password: Option<String>,
    ssl: bool,
    timeout: u64,
) -> Result<Connection, Error> {
    Options {
        username,
        password,
        ssl,
        timeout,
        ..Options::new(host, port)
    }
    .connect()
}
