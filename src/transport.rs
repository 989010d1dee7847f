//! ==============================================================================
//! transport.rs - data link to the remote api
//! ==============================================================================
//!
//! purpose:
//!     the link the control loop talks through. it is brought up in three
//!     steps (module, network, data service) and then carries one GET for the
//!     remote settings and one POST per telemetry sample.
//!
//! the http implementation maps the steps onto a plain ip uplink:
//!     - module:  build the http client
//!     - network: resolve the api host
//!     - service: open (and close) a tcp connection to it
//!
//! relationships:
//!     - used by: connectivity.rs (bring-up, reset), telemetry.rs (get/post)
//!     - uses: reqwest (blocking client), serde_json (post body)
//!
//! ==============================================================================

use anyhow::{anyhow, bail, Context, Result};
use reqwest::blocking::Client;
use reqwest::Url;
use std::net::{IpAddr, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::domain::DataPoint;

pub trait Transport: Send {
    fn init_module(&mut self) -> Result<()>;
    fn init_network(&mut self) -> Result<()>;
    fn init_service(&mut self) -> Result<()>;
    /// drop all link state; the next use needs a full bring-up
    fn reset_module(&mut self);
    fn http_get(&mut self, path: &str, timeout: Duration) -> Result<String>;
    fn http_post(&mut self, path: &str, point: &DataPoint) -> Result<()>;
}

pub struct HttpTransport {
    base: Url,
    request_timeout: Duration,
    client: Option<Client>,
    peer: Option<SocketAddr>,
    service_up: bool,
}

impl HttpTransport {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let base = Url::parse(base_url).with_context(|| format!("invalid api url {}", base_url))?;
        if base.host_str().is_none() {
            bail!("api url {} has no host", base_url);
        }
        Ok(Self { base, request_timeout, client: None, peer: None, service_up: false })
    }

    fn client(&self) -> Result<&Client> {
        if !self.service_up {
            bail!("data service not up");
        }
        self.client.as_ref().ok_or_else(|| anyhow!("module not initialized"))
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base.join(path).with_context(|| format!("bad api path {}", path))
    }
}

/// An api on this host must not be routed through a system proxy.
fn is_loopback(url: &Url) -> bool {
    match url.host_str() {
        Some("localhost") => true,
        Some(host) => host
            .trim_matches(|c| c == '[' || c == ']')
            .parse::<IpAddr>()
            .map(|ip| ip.is_loopback())
            .unwrap_or(false),
        None => false,
    }
}

impl Transport for HttpTransport {
    fn init_module(&mut self) -> Result<()> {
        let mut builder = Client::builder().timeout(self.request_timeout);
        if is_loopback(&self.base) {
            builder = builder.no_proxy();
        }
        let client = builder.build().context("failed to build http client")?;
        self.client = Some(client);
        Ok(())
    }

    fn init_network(&mut self) -> Result<()> {
        if self.client.is_none() {
            bail!("module not initialized");
        }
        let host = self.base.host_str().ok_or_else(|| anyhow!("api url has no host"))?;
        let port = self
            .base
            .port_or_known_default()
            .ok_or_else(|| anyhow!("api url has no port"))?;
        let peer = (host, port)
            .to_socket_addrs()
            .with_context(|| format!("failed to resolve {}", host))?
            .next()
            .ok_or_else(|| anyhow!("{} resolved to no address", host))?;
        tracing::debug!(%peer, "api host resolved");
        self.peer = Some(peer);
        Ok(())
    }

    fn init_service(&mut self) -> Result<()> {
        let peer = self.peer.ok_or_else(|| anyhow!("network not initialized"))?;
        TcpStream::connect_timeout(&peer, self.request_timeout)
            .with_context(|| format!("failed to reach {}", peer))?;
        self.service_up = true;
        Ok(())
    }

    fn reset_module(&mut self) {
        self.client = None;
        self.peer = None;
        self.service_up = false;
    }

    fn http_get(&mut self, path: &str, timeout: Duration) -> Result<String> {
        let url = self.url(path)?;
        let body = self
            .client()?
            .get(url)
            .timeout(timeout)
            .send()?
            .error_for_status()?
            .text()?;
        Ok(body)
    }

    fn http_post(&mut self, path: &str, point: &DataPoint) -> Result<()> {
        let url = self.url(path)?;
        self.client()?.post(url).json(point).send()?.error_for_status()?;
        Ok(())
    }
}
