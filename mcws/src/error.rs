//! Errors returned by the MCWS client.

use snafu::Snafu;

/// Errors returned when talking to a media server.
#[derive(Clone, Debug, Snafu, PartialEq)]
pub enum Error {
    /// The server could not be reached, or answered with an unexpected HTTP status.
    #[snafu(display("cannot connect to {url}: {message}"))]
    CannotConnect { url: String, message: String },

    /// The server rejected the configured credentials.
    #[snafu(display("invalid credentials for {url}"))]
    InvalidAuth { url: String },

    /// The server did not understand the request.
    #[snafu(display("invalid request {url} (HTTP {status})"))]
    InvalidRequest { url: String, status: u16 },

    /// The server failed while handling the request.
    #[snafu(display("media server error at {url} (HTTP {status})"))]
    MediaServer { url: String, status: u16 },

    /// The response body could not be parsed.
    #[snafu(display("malformed response from {url}: {message}"))]
    MalformedResponse { url: String, message: String },

    /// A field required to build a result was absent or unparseable.
    #[snafu(display("response is missing field {field}"))]
    MissingField { field: String },

    /// The request URL could not be built.
    #[snafu(display("invalid URL {url}: {message}"))]
    InvalidUrl { url: String, message: String },

    /// An argument was outside the range accepted by the server.
    #[snafu(display("{message}"))]
    InvalidArgument { message: String },
}

impl Error {
    /// Build an error from a non-success HTTP status.
    pub(crate) fn from_status(url: impl Into<String>, status: u16) -> Self {
        let url = url.into();
        match status {
            401 => Self::InvalidAuth { url },
            400 => Self::InvalidRequest { url, status },
            500 => Self::MediaServer { url, status },
            _ => Self::CannotConnect {
                url,
                message: format!("unexpected HTTP status {status}"),
            },
        }
    }
}
