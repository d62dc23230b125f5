//! Where editing fragments come from.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use super::fields::{field_value, qualify};
use crate::{BlockId, Node};

/// Why a fragment could not be obtained. Always recoverable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("render request failed: {0}")]
    Network(String),

    #[error("render endpoint returned HTTP {code}")]
    Status { code: u16 },

    #[error("render endpoint returned an empty body")]
    EmptyBody,

    #[error("render task failed: {0}")]
    Join(String),
}

/// One render request: the block's identity plus its attributes as
/// namespaced form fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderRequest {
    pub id: BlockId,
    pub kind: String,
    /// `(name, value)` pairs in send order: `id`, `type`, then
    /// `"{id}[{key}]"` per attribute.
    pub fields: Vec<(String, String)>,
}

impl RenderRequest {
    pub fn for_node(node: &Node) -> Self {
        let mut fields = Vec::with_capacity(node.attributes.len() + 2);
        fields.push(("id".to_string(), node.id.to_string()));
        fields.push(("type".to_string(), node.kind.clone()));
        for (key, value) in &node.attributes {
            fields.push((qualify(&node.id, key), field_value(value)));
        }
        Self {
            id: node.id.clone(),
            kind: node.kind.clone(),
            fields,
        }
    }
}

/// The render endpoint contract.
#[async_trait]
pub trait FragmentSource: Send + Sync {
    /// Produce the editing fragment for a request. An empty fragment is an
    /// error, never a valid result.
    async fn fetch(&self, request: &RenderRequest) -> Result<String, FetchError>;
}

/// POSTs form-encoded fields to an HTTP endpoint.
///
/// The URL template may contain `{type}` and `{id}`. The blocking client
/// runs on tokio's blocking pool.
#[derive(Clone)]
pub struct HttpFragmentSource {
    agent: ureq::Agent,
    url_template: String,
}

impl HttpFragmentSource {
    pub fn new(url_template: impl Into<String>, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self {
            agent,
            url_template: url_template.into(),
        }
    }

    /// The concrete URL for a request.
    pub fn url_for(&self, request: &RenderRequest) -> String {
        self.url_template
            .replace("{type}", &request.kind)
            .replace("{id}", request.id.as_str())
    }
}

impl std::fmt::Debug for HttpFragmentSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFragmentSource")
            .field("url_template", &self.url_template)
            .finish()
    }
}

#[async_trait]
impl FragmentSource for HttpFragmentSource {
    async fn fetch(&self, request: &RenderRequest) -> Result<String, FetchError> {
        let agent = self.agent.clone();
        let url = self.url_for(request);
        let fields = request.fields.clone();

        let body = tokio::task::spawn_blocking(move || {
            let form: Vec<(&str, &str)> = fields
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str()))
                .collect();
            match agent.post(&url).send_form(&form) {
                Ok(response) => response
                    .into_string()
                    .map_err(|e| FetchError::Network(e.to_string())),
                Err(ureq::Error::Status(code, _)) => Err(FetchError::Status { code }),
                Err(e) => Err(FetchError::Network(e.to_string())),
            }
        })
        .await
        .map_err(|e| FetchError::Join(e.to_string()))??;

        if body.trim().is_empty() {
            return Err(FetchError::EmptyBody);
        }
        Ok(body)
    }
}
