use async_trait::async_trait;
use push_ref::{Actor, Project, PushOptions, Revision};
use serde::{Deserialize, Serialize};

use crate::Error;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PipelineVariable {
    pub key: String,
    pub secret_value: String,
    pub variable_type: String,
}

impl PipelineVariable {
    pub fn env_var<K: Into<String>, V: Into<String>>(key: K, value: V) -> Self {
        Self {
            key: key.into(),
            secret_value: value.into(),
            variable_type: String::from("env_var"),
        }
    }
}

/// The parameters of a single pipeline creation request.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct PipelineRequest {
    pub before: String,
    pub after: String,

    #[serde(rename = "ref")]
    pub full_ref: String,

    pub variables_attributes: Vec<PipelineVariable>,
    pub push_options: PushOptions,
    pub checkout_sha: Option<Revision>,
}

impl PipelineRequest {
    /// A view of the request safe to write to logs: push options may carry
    /// user supplied values and are left out.
    pub fn sanitized(&self) -> SanitizedPipelineRequest<'_> {
        SanitizedPipelineRequest {
            before: &self.before,
            after: &self.after,
            full_ref: &self.full_ref,
            checkout_sha: self.checkout_sha.as_ref(),
            variables_attributes: &self.variables_attributes,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SanitizedPipelineRequest<'a> {
    pub before: &'a str,
    pub after: &'a str,

    #[serde(rename = "ref")]
    pub full_ref: &'a str,

    pub checkout_sha: Option<&'a Revision>,
    pub variables_attributes: &'a [PipelineVariable],
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct PipelineResponse {
    /// False when the engine accepted the request but did not create a
    /// pipeline.
    pub persisted: bool,
    pub pipeline_id: Option<u64>,
    pub message: Option<String>,
}

#[async_trait]
pub trait PipelineEngine: Send + Sync {
    async fn submit_creation_request(
        &self,
        project: &Project,
        actor: &Actor,
        request: PipelineRequest,
    ) -> Result<PipelineResponse, Error>;
}
