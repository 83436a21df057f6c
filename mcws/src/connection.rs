//! Low-level access to the MCWS HTTP API.

use crate::error::Error;
use base64::prelude::*;
use clap::Args;
use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;
use surf::Url;

mod xml;

pub use xml::Element;

/// The `Item` children of an MCWS response, keyed by their `Name` attribute, in document order.
pub type Items = IndexMap<String, String>;

/// Query parameters for a single request.
pub type Params = Vec<(&'static str, String)>;

/// Options for connecting to a media server.
#[derive(Clone, Debug, Args)]
#[group(id = "connection")]
pub struct Options {
    /// Host name or address of the media server.
    #[clap(long, env = "MCWS_HOST", default_value = "localhost")]
    pub host: String,

    /// Port on which the media server is listening.
    #[clap(long, env = "MCWS_PORT", default_value = "52199")]
    pub port: u16,

    /// User as which to authenticate.
    #[clap(short, long, env = "MCWS_USERNAME")]
    pub username: Option<String>,

    /// Password for authenticating with the media server.
    #[clap(short, long, env = "MCWS_PASSWORD")]
    pub password: Option<String>,

    /// Connect over HTTPS.
    #[clap(long, env = "MCWS_SSL")]
    pub ssl: bool,

    /// Request timeout, in seconds.
    #[clap(long, env = "MCWS_TIMEOUT", default_value = "5")]
    pub timeout: u64,
}

impl Options {
    /// Options for an unauthenticated plain HTTP connection to `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            username: None,
            password: None,
            ssl: false,
            timeout: 5,
        }
    }

    /// Authenticate as `username`.
    pub fn with_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self.password = Some(password.into());
        self
    }

    /// Connect to the media server with a dedicated HTTP client.
    pub fn connect(&self) -> Result<Connection, Error> {
        let client = surf::Config::new()
            .set_timeout(Some(Duration::from_secs(self.timeout)))
            .try_into()
            .map_err(|err| Error::CannotConnect {
                url: self.host_url(),
                message: format!("unable to build HTTP client: {err:?}"),
            })?;
        Ok(Connection::new(self, client))
    }

    /// Connect to the media server using an existing HTTP client.
    ///
    /// The client is shared, not owned: closing the resulting connection leaves it usable by its
    /// other holders. Timeouts are whatever `client` was configured with.
    pub fn connect_with(&self, client: surf::Client) -> Connection {
        Connection::new(self, client)
    }

    fn host_url(&self) -> String {
        format!(
            "http{}://{}:{}",
            if self.ssl { "s" } else { "" },
            self.host,
            self.port
        )
    }
}

/// A connection to MCWS.
#[derive(Clone)]
pub struct Connection {
    client: Option<surf::Client>,
    auth: Option<String>,
    host: String,
    port: u16,
    host_url: String,
    base_url: String,
}

impl Connection {
    fn new(opt: &Options, client: surf::Client) -> Self {
        let auth = opt.username.as_ref().map(|username| {
            let credentials = format!("{username}:{}", opt.password.as_deref().unwrap_or(""));
            format!("Basic {}", BASE64_STANDARD.encode(credentials))
        });
        let host_url = opt.host_url();
        let base_url = format!("{host_url}/MCWS/v1");
        Self {
            client: Some(client),
            auth,
            host: opt.host.clone(),
            port: opt.port,
            host_url,
            base_url,
        }
    }

    /// The root URL of the server, `http[s]://host:port`.
    pub fn host_url(&self) -> &str {
        &self.host_url
    }

    /// The host this connection talks to.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The port this connection talks to.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The full URL of an MCWS endpoint.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    /// Fetch an XML item list as a map from each `Item@Name` to the item text.
    ///
    /// Used where the items describe different fields of a single entity. The flag indicates
    /// whether the server reported the request as `OK`.
    pub async fn get_as_dict(&self, path: &str, params: Params) -> Result<(bool, Items), Error> {
        let (ok, root) = self.get_as_element(path, params).await?;
        Ok((ok, root.items()))
    }

    /// Fetch an XML item list as the list of item texts.
    ///
    /// Used where the items are unnamed distinct values, typically all from the same library
    /// field.
    pub async fn get_as_list(
        &self,
        path: &str,
        params: Params,
    ) -> Result<(bool, Vec<String>), Error> {
        let (ok, root) = self.get_as_element(path, params).await?;
        Ok((ok, root.values()))
    }

    /// Fetch a JSON response which must be a list, returned as is.
    pub async fn get_as_json_list(
        &self,
        path: &str,
        params: Params,
    ) -> Result<(bool, Vec<Value>), Error> {
        Ok((true, self.get_json(path, params).await?))
    }

    /// Fetch a JSON response which must be an object, returned as is.
    pub async fn get_as_json_dict(
        &self,
        path: &str,
        params: Params,
    ) -> Result<(bool, Map<String, Value>), Error> {
        Ok((true, self.get_json(path, params).await?))
    }

    /// Fetch an XML response as a parsed document.
    pub async fn get_as_element(
        &self,
        path: &str,
        params: Params,
    ) -> Result<(bool, Element), Error> {
        let (url, body) = self.get_text(path, params).await?;
        let root = xml::parse(&body).map_err(|message| Error::MalformedResponse {
            url: url.to_string(),
            message,
        })?;
        if !root.is_ok() {
            tracing::debug!(%url, status = ?root.attribute("Status"), "MCWS request not OK");
        }
        Ok((root.is_ok(), root))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, params: Params) -> Result<T, Error> {
        let (url, body) = self.get_text(path, params).await?;
        serde_json::from_str(&body).map_err(|err| Error::MalformedResponse {
            url: url.to_string(),
            message: err.to_string(),
        })
    }

    async fn get_text(&self, path: &str, params: Params) -> Result<(Url, String), Error> {
        let client = self.client.as_ref().ok_or_else(|| Error::CannotConnect {
            url: self.url(path),
            message: "connection is closed".into(),
        })?;
        let url = self.request_url(path, &params)?;
        tracing::debug!(%url, "MCWS request");

        let mut req = client.get(url.as_str());
        if let Some(auth) = &self.auth {
            req = req.header("Authorization", auth.as_str());
        }
        let mut res = req.await.map_err(|err| Error::CannotConnect {
            url: url.to_string(),
            message: err.to_string(),
        })?;

        let status = res.status();
        if !status.is_success() {
            tracing::warn!(%url, %status, "MCWS request failed");
            return Err(Error::from_status(url.as_str(), u16::from(status)));
        }
        let body = res
            .body_string()
            .await
            .map_err(|err| Error::MalformedResponse {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        Ok((url, body))
    }

    fn request_url(&self, path: &str, params: &Params) -> Result<Url, Error> {
        let url = self.url(path);
        let res = if params.is_empty() {
            Url::parse(&url)
        } else {
            Url::parse_with_params(&url, params.iter().map(|(k, v)| (*k, v.as_str())))
        };
        res.map_err(|err| Error::InvalidUrl {
            url,
            message: err.to_string(),
        })
    }

    /// Close the connection.
    ///
    /// This releases the connection's handle on its HTTP client. A client supplied through
    /// [`Options::connect_with`] stays usable by its other holders. Any further request on this
    /// connection fails with [`Error::CannotConnect`].
    pub fn close(&mut self) {
        if self.client.take().is_some() {
            tracing::debug!(host = %self.host_url, "closing MCWS connection");
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::{Stub, StubServer};

    #[async_std::test]
    async fn test_get_as_dict() {
        let server = StubServer::start([(
            "Alive",
            Stub::xml(
                r#"<Response Status="OK">
<Item Name="ProgramVersion">31.0.83</Item>
<Item Name="FriendlyName">MyServer</Item>
</Response>"#,
            ),
        )])
        .await
        .unwrap();
        let conn = server.options().connect().unwrap();

        let (ok, items) = conn.get_as_dict("Alive", vec![]).await.unwrap();
        assert!(ok);
        assert_eq!(items.len(), 2);
        assert_eq!(items["ProgramVersion"], "31.0.83");
        assert_eq!(items["FriendlyName"], "MyServer");
    }

    #[async_std::test]
    async fn test_get_as_list() {
        let server = StubServer::start([(
            "Library/Values",
            Stub::xml(
                r#"<Response Status="OK">
<Item>Beatles</Item>
<Item>Björk</Item>
</Response>"#,
            ),
        )])
        .await
        .unwrap();
        let conn = server.options().connect().unwrap();

        let (ok, values) = conn
            .get_as_list("Library/Values", vec![("Field", "Artist".into())])
            .await
            .unwrap();
        assert!(ok);
        assert_eq!(values, ["Beatles", "Björk"]);

        let requests = server.requests().await;
        assert_eq!(requests[0].path(), "/MCWS/v1/Library/Values");
        assert_eq!(requests[0].query(), Some("Field=Artist"));
    }

    #[async_std::test]
    async fn test_get_as_json() {
        let server = StubServer::start([
            ("Browse/Files", Stub::json(r#"[{"Key": "1"}, {"Key": "2"}]"#)),
            ("File/GetInfo", Stub::json(r#"{"Name": "Track"}"#)),
        ])
        .await
        .unwrap();
        let conn = server.options().connect().unwrap();

        let (ok, files) = conn.get_as_json_list("Browse/Files", vec![]).await.unwrap();
        assert!(ok);
        assert_eq!(files.len(), 2);
        assert_eq!(files[1]["Key"], "2");

        let (ok, info) = conn.get_as_json_dict("File/GetInfo", vec![]).await.unwrap();
        assert!(ok);
        assert_eq!(info["Name"], "Track");

        // An object is not a list.
        assert!(matches!(
            conn.get_as_json_list("File/GetInfo", vec![]).await,
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[async_std::test]
    async fn test_http_errors() {
        let server = StubServer::start([
            ("Unauthorized", Stub::status(401)),
            ("BadRequest", Stub::status(400)),
            ("ServerError", Stub::status(500)),
            ("Forbidden", Stub::status(403)),
            ("Garbage", Stub::xml("this is not xml")),
        ])
        .await
        .unwrap();
        let conn = server.options().connect().unwrap();

        assert!(matches!(
            conn.get_as_dict("Unauthorized", vec![]).await,
            Err(Error::InvalidAuth { .. })
        ));
        assert!(matches!(
            conn.get_as_dict("BadRequest", vec![]).await,
            Err(Error::InvalidRequest { status: 400, .. })
        ));
        assert!(matches!(
            conn.get_as_dict("ServerError", vec![]).await,
            Err(Error::MediaServer { status: 500, .. })
        ));
        assert!(matches!(
            conn.get_as_dict("Forbidden", vec![]).await,
            Err(Error::CannotConnect { .. })
        ));
        assert!(matches!(
            conn.get_as_dict("Garbage", vec![]).await,
            Err(Error::MalformedResponse { .. })
        ));
    }

    #[async_std::test]
    async fn test_cannot_connect() {
        let port = portpicker::pick_unused_port().unwrap();
        let conn = Options::new("localhost", port).connect().unwrap();
        assert!(matches!(
            conn.get_as_dict("Alive", vec![]).await,
            Err(Error::CannotConnect { .. })
        ));
    }

    #[async_std::test]
    async fn test_basic_auth() {
        let server = StubServer::start([("Alive", Stub::xml(r#"<Response Status="OK"/>"#))])
            .await
            .unwrap();
        let conn = server
            .options()
            .with_auth("user", "secret")
            .connect()
            .unwrap();
        conn.get_as_dict("Alive", vec![]).await.unwrap();

        // "user:secret"
        assert_eq!(
            server.authorizations().await,
            [Some("Basic dXNlcjpzZWNyZXQ=".to_string())]
        );
    }

    #[async_std::test]
    async fn test_close() {
        let server = StubServer::start([("Alive", Stub::xml(r#"<Response Status="OK"/>"#))])
            .await
            .unwrap();
        let client = surf::Client::new();
        let mut conn = server.options().connect_with(client.clone());
        conn.get_as_dict("Alive", vec![]).await.unwrap();

        conn.close();
        assert!(matches!(
            conn.get_as_dict("Alive", vec![]).await,
            Err(Error::CannotConnect { .. })
        ));

        // The shared client is still usable.
        let res = client
            .get(format!("http://127.0.0.1:{}/MCWS/v1/Alive", server.port()))
            .await
            .unwrap();
        assert!(res.status().is_success());
    }

    #[test]
    fn test_urls() {
        let conn = Options {
            ssl: true,
            ..Options::new("media.local", 52200)
        }
        .connect()
        .unwrap();
        assert_eq!(conn.host_url(), "https://media.local:52200");
        assert_eq!(conn.url("Alive"), "https://media.local:52200/MCWS/v1/Alive");
        assert_eq!(conn.host(), "media.local");
        assert_eq!(conn.port(), 52200);
    }
}
