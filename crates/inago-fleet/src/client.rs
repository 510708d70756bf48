use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

use inago_core::UnitFile;

use crate::api::{
    options_from_unit_file, ApiErrorBody, ApiMachine, ApiUnit, ApiUnitState, MachinePage,
    UnitPage, UnitPut, UnitStatePage,
};
use crate::endpoint::{Endpoint, DEFAULT_ENDPOINT};
use crate::error::FleetError;
use crate::Fleet;

const API_PREFIX: &str = "/fleet/v1";

#[derive(Debug, Clone)]
pub struct FleetConfig {
    pub endpoint: String,
    pub request_timeout: Duration,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            request_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Verb {
    Get,
    Put,
    Delete,
}

struct Response {
    status: u16,
    body: Bytes,
}

impl Response {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    fn into_error(self) -> FleetError {
        let message = serde_json::from_slice::<ApiErrorBody>(&self.body)
            .ok()
            .map(|b| b.error.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| String::from_utf8_lossy(&self.body).trim().to_string());
        FleetError::Api {
            status: self.status,
            message,
        }
    }
}

enum Transport {
    Http { client: reqwest::Client, base: Url },
    Unix { path: PathBuf },
}

/// Paged listing responses.
trait Page: DeserializeOwned {
    type Item;
    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

impl Page for UnitPage {
    type Item = ApiUnit;
    fn into_parts(self) -> (Vec<ApiUnit>, Option<String>) {
        (self.units, self.next_page_token)
    }
}

impl Page for UnitStatePage {
    type Item = ApiUnitState;
    fn into_parts(self) -> (Vec<ApiUnitState>, Option<String>) {
        (self.states, self.next_page_token)
    }
}

impl Page for MachinePage {
    type Item = ApiMachine;
    fn into_parts(self) -> (Vec<ApiMachine>, Option<String>) {
        (self.machines, self.next_page_token)
    }
}

/// Client for a fleet daemon's v1 API over HTTP or a local domain socket.
pub struct FleetClient {
    endpoint: Endpoint,
    transport: Transport,
    timeout: Duration,
}

impl FleetClient {
    pub fn new(config: &FleetConfig) -> Result<Self, FleetError> {
        let endpoint = Endpoint::parse(&config.endpoint)?;
        let transport = match &endpoint {
            Endpoint::Unix(path) => Transport::Unix { path: path.clone() },
            Endpoint::Http(base) => Transport::Http {
                client: reqwest::Client::builder()
                    .timeout(config.request_timeout)
                    .build()
                    .map_err(FleetError::transport)?,
                base: base.clone(),
            },
        };
        Ok(Self {
            endpoint,
            transport,
            timeout: config.request_timeout,
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    async fn send(&self, verb: Verb, path: &str, body: Option<Vec<u8>>) -> Result<Response, FleetError> {
        debug!("fleet {verb:?} {path}");
        match &self.transport {
            Transport::Http { client, base } => {
                let url = format!("{}{API_PREFIX}/{path}", base.as_str().trim_end_matches('/'));
                let mut rb = match verb {
                    Verb::Get => client.get(url),
                    Verb::Put => client.put(url),
                    Verb::Delete => client.delete(url),
                };
                if let Some(body) = body {
                    rb = rb
                        .header(reqwest::header::CONTENT_TYPE, "application/json")
                        .body(body);
                }
                let resp = rb.send().await.map_err(FleetError::transport)?;
                let status = resp.status().as_u16();
                let body = resp.bytes().await.map_err(FleetError::transport)?;
                Ok(Response { status, body })
            }
            Transport::Unix { path: sock } => {
                let uri = format!("{API_PREFIX}/{path}");
                tokio::time::timeout(self.timeout, send_unix(sock, verb, &uri, body))
                    .await
                    .map_err(FleetError::transport)?
            }
        }
    }

    async fn list<P: Page>(&self, resource: &str) -> Result<Vec<P::Item>, FleetError> {
        let mut items = Vec::new();
        let mut token: Option<String> = None;
        loop {
            let path = match &token {
                Some(t) => format!("{resource}?nextPageToken={t}"),
                None => resource.to_string(),
            };
            let resp = self.send(Verb::Get, &path, None).await?;
            if !resp.is_success() {
                return Err(resp.into_error());
            }
            let (page, next) = serde_json::from_slice::<P>(&resp.body)?.into_parts();
            items.extend(page);
            match next.filter(|t| !t.is_empty()) {
                Some(t) => token = Some(t),
                None => return Ok(items),
            }
        }
    }

    async fn set_desired_state(&self, name: &str, state: &str) -> Result<(), FleetError> {
        let body = serde_json::to_vec(&UnitPut {
            desired_state: state,
            options: None,
        })?;
        let resp = self.send(Verb::Put, &format!("units/{name}"), Some(body)).await?;
        match resp.status {
            404 => Err(FleetError::UnitNotFound(name.to_string())),
            _ if resp.is_success() => Ok(()),
            _ => Err(resp.into_error()),
        }
    }
}

#[cfg(unix)]
async fn send_unix(
    sock: &std::path::Path,
    verb: Verb,
    uri: &str,
    body: Option<Vec<u8>>,
) -> Result<Response, FleetError> {
    use http_body_util::{BodyExt, Full};
    use hyper::header::{CONTENT_TYPE, HOST};
    use hyper_util::rt::TokioIo;

    let stream = tokio::net::UnixStream::connect(sock)
        .await
        .map_err(FleetError::transport)?;
    let (mut sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(stream))
        .await
        .map_err(FleetError::transport)?;
    tokio::spawn(async move {
        if let Err(e) = conn.await {
            debug!("fleet socket connection ended: {e}");
        }
    });

    let method = match verb {
        Verb::Get => hyper::Method::GET,
        Verb::Put => hyper::Method::PUT,
        Verb::Delete => hyper::Method::DELETE,
    };
    // The host header is required by HTTP/1.1 but ignored on a socket.
    let mut builder = hyper::Request::builder()
        .method(method)
        .uri(uri)
        .header(HOST, "domain-sock");
    if body.is_some() {
        builder = builder.header(CONTENT_TYPE, "application/json");
    }
    let req = builder
        .body(Full::new(Bytes::from(body.unwrap_or_default())))
        .map_err(FleetError::transport)?;

    let resp = sender.send_request(req).await.map_err(FleetError::transport)?;
    let status = resp.status().as_u16();
    let body = resp
        .into_body()
        .collect()
        .await
        .map_err(FleetError::transport)?
        .to_bytes();
    Ok(Response { status, body })
}

#[cfg(not(unix))]
async fn send_unix(
    sock: &std::path::Path,
    _verb: Verb,
    _uri: &str,
    _body: Option<Vec<u8>>,
) -> Result<Response, FleetError> {
    Err(FleetError::InvalidEndpoint(format!(
        "domain sockets are not supported on this platform: {}",
        sock.display()
    )))
}

#[async_trait]
impl Fleet for FleetClient {
    async fn submit(&self, name: &str, content: &str) -> Result<(), FleetError> {
        let uf = UnitFile::parse(content).map_err(FleetError::UnitFile)?;
        let body = serde_json::to_vec(&UnitPut {
            desired_state: "loaded",
            options: Some(options_from_unit_file(&uf)),
        })?;
        let resp = self.send(Verb::Put, &format!("units/{name}"), Some(body)).await?;
        match resp.status {
            409 => {
                debug!("unit {name} already submitted");
                Ok(())
            }
            _ if resp.is_success() => Ok(()),
            _ => Err(resp.into_error()),
        }
    }

    async fn start(&self, name: &str) -> Result<(), FleetError> {
        self.set_desired_state(name, "launched").await
    }

    async fn stop(&self, name: &str) -> Result<(), FleetError> {
        self.set_desired_state(name, "loaded").await
    }

    async fn destroy(&self, name: &str) -> Result<(), FleetError> {
        let resp = self.send(Verb::Delete, &format!("units/{name}"), None).await?;
        match resp.status {
            404 => Err(FleetError::UnitNotFound(name.to_string())),
            _ if resp.is_success() => Ok(()),
            _ => Err(resp.into_error()),
        }
    }

    async fn list_units(&self) -> Result<Vec<ApiUnit>, FleetError> {
        self.list::<UnitPage>("units").await
    }

    async fn list_unit_states(&self) -> Result<Vec<ApiUnitState>, FleetError> {
        self.list::<UnitStatePage>("state").await
    }

    async fn list_machines(&self) -> Result<Vec<ApiMachine>, FleetError> {
        self.list::<MachinePage>("machines").await
    }
}
