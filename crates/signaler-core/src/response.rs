//! Provisioning-protocol acknowledgement.
//!
//! Every custom-resource request must be answered with an HTTP PUT of an
//! [`AckBody`] to its pre-signed `ResponseURL`, success or failure, or the
//! stack operation hangs until CloudFormation's own timeout.

use crate::error::{Result, SignalerError};
use crate::event::{CustomResourceRequest, Invocation};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AckStatus {
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct AckBody {
    pub status: AckStatus,
    pub reason: String,
    pub physical_resource_id: String,
    pub stack_id: String,
    pub request_id: String,
    pub logical_resource_id: String,
    pub data: Value,
}

/// A fully addressed acknowledgement.
#[derive(Debug, Clone, PartialEq)]
pub struct Ack {
    pub response_url: String,
    pub body: AckBody,
}

impl Ack {
    /// Build an acknowledgement for `req`. `reason` defaults to a pointer at
    /// the invocation's log stream, which also serves as the physical id when
    /// the request carries none.
    pub fn for_request(
        req: &CustomResourceRequest,
        invocation: &Invocation,
        status: AckStatus,
        reason: Option<String>,
        data: Value,
    ) -> Self {
        Self {
            response_url: req.response_url.clone(),
            body: AckBody {
                status,
                reason: reason.unwrap_or_else(|| default_reason(invocation)),
                physical_resource_id: req
                    .physical_resource_id
                    .clone()
                    .unwrap_or_else(|| invocation.log_stream_name.clone()),
                stack_id: req.stack_id.clone(),
                request_id: req.request_id.clone(),
                logical_resource_id: req.logical_resource_id.clone(),
                data,
            },
        }
    }

    /// Best-effort FAILED acknowledgement for a payload that could not be
    /// parsed as a provisioning request but still names a `ResponseURL`.
    pub fn salvage(payload: &Value, invocation: &Invocation, reason: String) -> Option<Self> {
        let field = |name: &str| {
            payload
                .get(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        let response_url = field("ResponseURL");
        if response_url.is_empty() {
            return None;
        }
        let physical = field("PhysicalResourceId");
        Some(Self {
            response_url,
            body: AckBody {
                status: AckStatus::Failed,
                reason,
                physical_resource_id: if physical.is_empty() {
                    invocation.log_stream_name.clone()
                } else {
                    physical
                },
                stack_id: field("StackId"),
                request_id: field("RequestId"),
                logical_resource_id: field("LogicalResourceId"),
                data: Value::Object(Default::default()),
            },
        })
    }
}

fn default_reason(invocation: &Invocation) -> String {
    format!(
        "See the details in CloudWatch Log Stream: {}",
        invocation.log_stream_name
    )
}

#[async_trait]
pub trait AckSender: Send + Sync {
    async fn send(&self, ack: &Ack) -> Result<()>;
}

// ---------------------------------------------------------------------------
// HttpAckSender
// ---------------------------------------------------------------------------

pub struct HttpAckSender {
    client: reqwest::Client,
}

impl HttpAckSender {
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SignalerError::AckFailed(e.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl AckSender for HttpAckSender {
    async fn send(&self, ack: &Ack) -> Result<()> {
        let body = serde_json::to_vec(&ack.body)?;
        // The URL is pre-signed without a content type.
        let resp = self
            .client
            .put(&ack.response_url)
            .header(reqwest::header::CONTENT_TYPE, "")
            .body(body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "acknowledgement request failed");
                SignalerError::AckFailed(e.to_string())
            })?;

        let status = resp.status();
        tracing::info!(
            status = status.as_u16(),
            request_id = %ack.body.request_id,
            ack = ?ack.body.status,
            "acknowledgement delivered"
        );
        if !status.is_success() {
            return Err(SignalerError::AckFailed(format!("HTTP {status}")));
        }
        Ok(())
    }
}
