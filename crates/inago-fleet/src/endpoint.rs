use std::fmt;
use std::path::PathBuf;

use reqwest::Url;

use crate::error::FleetError;

pub const DEFAULT_ENDPOINT: &str = "unix:///var/run/fleet.sock";

/// Where the fleet API lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// Local domain socket (`unix://` or `file://`).
    Unix(PathBuf),
    /// Plain HTTP(S) base URL.
    Http(Url),
}

impl Endpoint {
    pub fn parse(raw: &str) -> Result<Self, FleetError> {
        let url = Url::parse(raw)
            .map_err(|e| FleetError::InvalidEndpoint(format!("{raw}: {e}")))?;

        match url.scheme() {
            "unix" | "file" => {
                // `unix://var/run/fleet.sock` parses "var" as the host.
                if let Some(host) = url.host_str().filter(|h| !h.is_empty()) {
                    return Err(FleetError::InvalidEndpoint(format!(
                        "unable to connect to host '{host}' with scheme '{}'",
                        url.scheme()
                    )));
                }
                if url.path().is_empty() || url.path() == "/" {
                    return Err(FleetError::InvalidEndpoint(format!(
                        "{raw}: missing socket path"
                    )));
                }
                Ok(Endpoint::Unix(PathBuf::from(url.path())))
            }
            "http" | "https" => Ok(Endpoint::Http(url)),
            other => Err(FleetError::InvalidEndpoint(format!(
                "invalid scheme '{other}' in fleet endpoint"
            ))),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Unix(path) => write!(f, "unix://{}", path.display()),
            Endpoint::Http(url) => write!(f, "{url}"),
        }
    }
}
