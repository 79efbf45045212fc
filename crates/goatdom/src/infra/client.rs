//! HTTP client for the tree-building and scraping backend.

use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::app::builder::TreeSource;
use crate::domain::errors::DomainError;
use crate::domain::model::{DomNode, Flags, NodeId, NodeOutput, ScrapeRequest};
use crate::infra::config::Service;

/// Talks to the backend's `dom-tree/build` and `scrape` endpoints.
#[derive(Debug, Clone)]
pub struct ServiceClient {
    http: reqwest::Client,
    base: Url,
    token: Option<String>,
}

impl ServiceClient {
    pub fn new(base: Url, timeout: Duration, token: Option<String>) -> Result<Self> {
        if base.cannot_be_a_base() {
            bail!("service URL cannot be used as a base: {base}");
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { http, base, token })
    }

    pub fn from_config(service: &Service) -> Result<Self> {
        Self::new(
            service.url()?,
            service.request_timeout(),
            service.api_token.clone(),
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Run a scrape and return the backend's dataset untouched.
    pub async fn scrape(&self, request: &ScrapeRequest) -> Result<Value, DomainError> {
        let body = WireScrapeRequest {
            url: &request.url,
            retrieval_instructions: request
                .retrieval_instructions
                .iter()
                .map(|instruction| WireInstruction {
                    node_query: &instruction.node_query,
                    output: &instruction.output,
                    flags: &instruction.flags,
                })
                .collect(),
        };
        self.post(&["scrape"], &body).await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, DomainError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|()| DomainError::Network(format!("invalid service URL {}", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn post<B, R>(&self, segments: &[&str], body: &B) -> Result<R, DomainError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let url = self.endpoint(segments)?;
        tracing::debug!(endpoint = %url, "posting to service");

        let mut request = self.http.post(url.clone()).json(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| DomainError::Network(format!("request to {url} failed: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DomainError::Network(format!("{url} returned {status}")));
        }
        response
            .json::<R>()
            .await
            .map_err(|err| DomainError::Network(format!("invalid response from {url}: {err}")))
    }
}

#[async_trait]
impl TreeSource for ServiceClient {
    async fn build_tree(&self, url: &str) -> Result<DomNode, DomainError> {
        let envelope: WireTree = self
            .post(&["dom-tree", "build"], &BuildTreeRequest { url })
            .await?;
        Ok(envelope.root.into_node())
    }
}

#[derive(Serialize)]
struct BuildTreeRequest<'a> {
    url: &'a str,
}

#[derive(Deserialize)]
struct WireTree {
    root: WireNode,
}

/// Node as the backend serializes it; unknown fields are ignored.
#[derive(Deserialize)]
struct WireNode {
    id: NodeId,
    #[serde(default)]
    tag_type: Option<String>,
    #[serde(default)]
    raw: Option<String>,
    #[serde(default, alias = "hasData")]
    has_data: bool,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    html_attributes: Option<BTreeMap<String, Value>>,
    #[serde(default)]
    children: Option<Vec<WireNode>>,
}

impl WireNode {
    fn into_node(self) -> DomNode {
        DomNode {
            id: self.id,
            tag_type: self.tag_type.unwrap_or_default(),
            raw_preview: self.raw.unwrap_or_default(),
            body: if self.has_data { self.body } else { None },
            attributes: self
                .html_attributes
                .unwrap_or_default()
                .into_iter()
                .map(|(name, value)| (name, attribute_text(value)))
                .collect(),
            children: self
                .children
                .unwrap_or_default()
                .into_iter()
                .map(WireNode::into_node)
                .collect(),
        }
    }
}

fn attribute_text(value: Value) -> String {
    match value {
        Value::String(text) => text,
        Value::Null => String::new(),
        Value::Array(items) => items
            .into_iter()
            .map(attribute_text)
            .collect::<Vec<_>>()
            .join(" "),
        other => other.to_string(),
    }
}

#[derive(Serialize)]
struct WireScrapeRequest<'a> {
    url: &'a str,
    retrieval_instructions: Vec<WireInstruction<'a>>,
}

/// Instruction without its authoring-only preview.
#[derive(Serialize)]
struct WireInstruction<'a> {
    node_query: &'a str,
    output: &'a NodeOutput,
    flags: &'a Flags,
}
