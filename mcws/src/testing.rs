//! A stub MCWS server for testing clients without a real media server.
//!
//! The stub serves canned responses from an in-process HTTP server listening on an unused local
//! port, and records every request it receives so tests can check what was sent.
#![cfg(any(test, feature = "testing"))]

use crate::connection::Options;
use anyhow::Error;
use async_std::net::TcpStream;
use async_std::sync::{Arc, Mutex};
use async_std::task::{sleep, spawn};
use portpicker::pick_unused_port;
use std::time::Duration;
use surf::Url;
use tide::http::mime::{self, Mime};

/// A canned response.
#[derive(Clone, Debug)]
pub struct Stub {
    status: u16,
    body: String,
    mime: Mime,
}

impl Stub {
    /// Respond with an XML document.
    pub fn xml(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            mime: mime::XML,
        }
    }

    /// Respond with a JSON document.
    pub fn json(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            body: body.into(),
            mime: mime::JSON,
        }
    }

    /// Respond with an empty body and the given HTTP status.
    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: String::new(),
            mime: mime::PLAIN,
        }
    }
}

/// A request received by the stub.
#[derive(Clone, Debug)]
struct Received {
    url: Url,
    authorization: Option<String>,
}

/// A running stub MCWS server.
pub struct StubServer {
    port: u16,
    received: Arc<Mutex<Vec<Received>>>,
}

impl StubServer {
    /// Start a server answering each MCWS endpoint path with its stub.
    ///
    /// Paths are relative to `/MCWS/v1/`. The path `*` matches any endpoint. Requests for paths
    /// without a stub get a 404.
    pub async fn start<P: AsRef<str>>(
        stubs: impl IntoIterator<Item = (P, Stub)>,
    ) -> Result<Self, Error> {
        let received = Arc::new(Mutex::new(vec![]));
        let mut app = tide::new();
        for (path, stub) in stubs {
            let route = match path.as_ref() {
                "*" => "/MCWS/v1/*path".to_string(),
                path => format!("/MCWS/v1/{path}"),
            };
            let received = received.clone();
            app.at(&route).get(move |req: tide::Request<()>| {
                let stub = stub.clone();
                let received = received.clone();
                async move {
                    received.lock().await.push(Received {
                        url: req.url().clone(),
                        authorization: req
                            .header("Authorization")
                            .map(|values| values.last().as_str().to_string()),
                    });
                    Ok(tide::Response::builder(stub.status)
                        .body(stub.body)
                        .content_type(stub.mime)
                        .build())
                }
            });
        }

        let port = pick_unused_port().ok_or_else(|| Error::msg("no free port"))?;
        spawn(async move {
            if let Err(err) = app.listen(format!("127.0.0.1:{port}")).await {
                tracing::error!("stub server exited: {err}");
            }
        });
        wait_for_server(port).await?;

        Ok(Self { port, received })
    }

    /// The port the stub is listening on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Options for connecting to the stub.
    pub fn options(&self) -> Options {
        Options::new("127.0.0.1", self.port)
    }

    /// The URL of each request received so far, in order.
    pub async fn requests(&self) -> Vec<Url> {
        self.received
            .lock()
            .await
            .iter()
            .map(|req| req.url.clone())
            .collect()
    }

    /// The `Authorization` header of each request received so far, in order.
    pub async fn authorizations(&self) -> Vec<Option<String>> {
        self.received
            .lock()
            .await
            .iter()
            .map(|req| req.authorization.clone())
            .collect()
    }

    /// The query parameters of the most recent request.
    pub async fn last_query(&self) -> Vec<(String, String)> {
        self.received
            .lock()
            .await
            .last()
            .map(|req| req.url.query_pairs().into_owned().collect())
            .unwrap_or_default()
    }
}

async fn wait_for_server(port: u16) -> Result<(), Error> {
    const MAX_CONNECT_RETRIES: usize = 100;

    for _ in 0..MAX_CONNECT_RETRIES {
        match TcpStream::connect(("127.0.0.1", port)).await {
            Ok(_) => return Ok(()),
            Err(err) => {
                tracing::debug!("waiting for stub server to start: {err}");
                sleep(Duration::from_millis(50)).await;
            }
        }
    }

    Err(Error::msg("timed out waiting for stub server"))
}
