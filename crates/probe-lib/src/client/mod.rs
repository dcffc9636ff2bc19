//! REST clients for Mesos masters and agents
//!
//! One-shot request/response clients. The master client handles the vendor
//! login flow and carries the session token; the agent client pulls the
//! per-executor statistics document. Both are behind traits so the leader
//! tracker and discovery workers can be exercised with mocks.

mod endpoints;

pub use endpoints::{AgentEndpointName, EndpointStore, MasterEndpointName};

use crate::config::MesosVendor;
use crate::error::{Error, Result};
use crate::models::{Executor, StateResponse, TokenResponse};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

const AUTH_HEADER: &str = "Authorization";
const CONTENT_TYPE_JSON: &str = "application/json";

/// Connection parameters for one master.
#[derive(Debug, Clone)]
pub struct MasterConf {
    pub vendor: MesosVendor,
    pub ip: String,
    /// May be empty; DC/OS gateways are addressed without a port.
    pub port: String,
    pub username: String,
    pub password: String,
    pub token: Option<String>,
}

/// Client for the master REST API.
#[async_trait]
pub trait MasterRestClient: Send + Sync {
    /// Authenticate against the master. Returns the session token; vendors
    /// without a login endpoint return an empty token without I/O.
    async fn login(&mut self) -> Result<String>;

    /// Fetch and decode the master `state` document.
    async fn get_state(&self) -> Result<StateResponse>;

    /// Session token obtained by the last successful login, if any.
    fn token(&self) -> Option<&str>;
}

/// Client for one agent's statistics endpoint.
#[async_trait]
pub trait AgentRestClient: Send + Sync {
    async fn get_stats(&self) -> Result<Vec<Executor>>;
}

/// Produces clients for arbitrary masters and agents of one target.
pub trait RestClientFactory: Send + Sync {
    fn master_client(&self, conf: MasterConf) -> Box<dyn MasterRestClient>;
    fn agent_client(&self, ip: &str, port: &str, token: Option<String>)
        -> Box<dyn AgentRestClient>;
}

fn base_url(ip: &str, port: &str) -> String {
    if port.is_empty() {
        format!("http://{ip}")
    } else {
        format!("http://{ip}:{port}")
    }
}

async fn read_success_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(Error::Protocol {
            status: status.as_u16(),
            message: body.chars().take(256).collect(),
        });
    }
    if body.is_empty() {
        return Err(Error::Protocol {
            status: status.as_u16(),
            message: "empty response body".to_string(),
        });
    }
    Ok(body)
}

/// Master client backed by HTTP, with the vendor paths taken from an
/// [`EndpointStore`].
pub struct HttpMasterClient {
    http: reqwest::Client,
    endpoints: EndpointStore,
    conf: MasterConf,
}

impl HttpMasterClient {
    pub fn new(http: reqwest::Client, conf: MasterConf) -> Self {
        let endpoints = EndpointStore::for_vendor(conf.vendor);
        Self {
            http,
            endpoints,
            conf,
        }
    }
}

#[async_trait]
impl MasterRestClient for HttpMasterClient {
    async fn login(&mut self) -> Result<String> {
        let path = match self.endpoints.master_path(MasterEndpointName::Login) {
            Some(path) => path,
            // No login endpoint for this vendor.
            None => return Ok(String::new()),
        };

        let url =
            url::Url::parse(&format!("{}{}", base_url(&self.conf.ip, &self.conf.port), path))?;
        debug!(url = %url, "master login");
        let credentials = json!({
            "uid": self.conf.username,
            "password": self.conf.password,
        });
        let response = self
            .http
            .post(url)
            .header("Content-Type", CONTENT_TYPE_JSON)
            .json(&credentials)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Auth(format!(
                "master {} rejected credentials: {}",
                self.conf.ip,
                body.chars().take(128).collect::<String>()
            )));
        }

        let body = read_success_body(response).await?;
        let token: TokenResponse = serde_json::from_str(&body)?;
        self.conf.token = Some(token.token.clone());
        Ok(token.token)
    }

    async fn get_state(&self) -> Result<StateResponse> {
        let path = self
            .endpoints
            .master_path(MasterEndpointName::State)
            .expect("every endpoint store has a state path");
        let url =
            url::Url::parse(&format!("{}{}", base_url(&self.conf.ip, &self.conf.port), path))?;
        debug!(url = %url, "master state");

        let mut request = self
            .http
            .get(url)
            .header("Content-Type", CONTENT_TYPE_JSON);
        if let Some(token) = self.conf.token.as_deref().filter(|t| !t.is_empty()) {
            request = request.header(AUTH_HEADER, format!("token={token}"));
        }

        let body = read_success_body(request.send().await?).await?;
        Ok(serde_json::from_str(&body)?)
    }

    fn token(&self) -> Option<&str> {
        self.conf.token.as_deref()
    }
}

/// Agent client backed by HTTP.
pub struct HttpAgentClient {
    http: reqwest::Client,
    stats_url: String,
    token: Option<String>,
}

impl HttpAgentClient {
    pub fn new(
        http: reqwest::Client,
        vendor: MesosVendor,
        ip: &str,
        port: &str,
        token: Option<String>,
    ) -> Self {
        let store = EndpointStore::for_vendor(vendor);
        let path = store
            .agent_path(AgentEndpointName::Stats)
            .expect("every endpoint store has a stats path");
        Self {
            http,
            stats_url: format!("{}{}", base_url(ip, port), path),
            token,
        }
    }
}

#[async_trait]
impl AgentRestClient for HttpAgentClient {
    async fn get_stats(&self) -> Result<Vec<Executor>> {
        debug!(url = %self.stats_url, "agent stats");
        let url = url::Url::parse(&self.stats_url)?;
        let mut request = self
            .http
            .get(url)
            .header("Content-Type", CONTENT_TYPE_JSON);
        if let Some(token) = self.token.as_deref().filter(|t| !t.is_empty()) {
            request = request.header(AUTH_HEADER, format!("token={token}"));
        }

        let body = read_success_body(request.send().await?).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Production factory sharing one pooled HTTP client across all masters and
/// agents of a target.
pub struct HttpClientFactory {
    vendor: MesosVendor,
    http: reqwest::Client,
}

impl HttpClientFactory {
    pub fn new(vendor: MesosVendor, request_timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;
        Ok(Self { vendor, http })
    }
}

impl RestClientFactory for HttpClientFactory {
    fn master_client(&self, conf: MasterConf) -> Box<dyn MasterRestClient> {
        Box::new(HttpMasterClient::new(self.http.clone(), conf))
    }

    fn agent_client(
        &self,
        ip: &str,
        port: &str,
        token: Option<String>,
    ) -> Box<dyn AgentRestClient> {
        Box::new(HttpAgentClient::new(
            self.http.clone(),
            self.vendor,
            ip,
            port,
            token,
        ))
    }
}
