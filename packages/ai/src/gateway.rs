// ABOUTME: Provider-agnostic model gateway trait and request types
// ABOUTME: The seam behind which provider SDK integrations live

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::conversation::{Part, Turn};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The call was cancelled; must propagate without retry
    #[error("model call cancelled")]
    Cancelled,

    #[error("provider error: {0}")]
    Provider(String),

    #[error("malformed response: {0}")]
    MalformedResponse(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;

/// Model-facing definition of one function in a tool schema
#[derive(Debug, Clone, Serialize)]
pub struct FunctionDef {
    pub name: String,
    pub description: String,
    /// JSON Schema of the arguments object
    pub parameters: Value,
}

/// Model capability tier requested for a call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Default,
    /// Cheaper, lower-latency tier for high-frequency structured calls
    Lite,
    Reasoning,
}

/// What shape of response the caller expects back
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseType {
    Text,
    FunctionCall,
}

/// One generation request: the tool schema plus routing hints
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub function_defs: Vec<FunctionDef>,
    pub model_tier: ModelTier,
    /// When set, the model must answer with a call to this function
    pub required_function_name: Option<String>,
    pub expected_response_type: ResponseType,
}

/// Provider-agnostic content generation. Given a transcript and a tool
/// schema, returns text and/or typed tool calls. Provider selection and SDK
/// plumbing are the implementor's concern.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn generate_content(
        &self,
        transcript: &[Turn],
        request: &GenerateRequest,
    ) -> GatewayResult<Vec<Part>>;
}
