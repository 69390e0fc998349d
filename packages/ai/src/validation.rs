// ABOUTME: Response validation and recovery for gateway output
// ABOUTME: May repair a structurally invalid response with one extra model call

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::conversation::{Part, Turn};
use crate::gateway::{GatewayResult, GenerateRequest, ModelGateway, ResponseType};

/// Post-processes a raw gateway response before it reaches the caller.
#[async_trait]
pub trait ResponseValidator: Send + Sync {
    async fn validate(
        &self,
        gateway: &dyn ModelGateway,
        transcript: &[Turn],
        request: &GenerateRequest,
        parts: Vec<Part>,
    ) -> GatewayResult<Vec<Part>>;
}

/// Returns the response unchanged.
pub struct PassthroughValidator;

#[async_trait]
impl ResponseValidator for PassthroughValidator {
    async fn validate(
        &self,
        _gateway: &dyn ModelGateway,
        _transcript: &[Turn],
        _request: &GenerateRequest,
        parts: Vec<Part>,
    ) -> GatewayResult<Vec<Part>> {
        Ok(parts)
    }
}

/// Checks the response against the request's structural expectations and
/// re-issues the call once when it does not conform. A response that is
/// still non-conformant after recovery is returned as-is; the caller decides
/// how to react to a missing tool call.
pub struct SchemaValidator;

impl SchemaValidator {
    fn conforms(request: &GenerateRequest, parts: &[Part]) -> bool {
        match &request.required_function_name {
            Some(name) => parts
                .iter()
                .any(|part| part.as_tool_call().is_some_and(|call| &call.name == name)),
            None => {
                request.expected_response_type != ResponseType::FunctionCall
                    || parts.iter().any(|part| part.as_tool_call().is_some())
            }
        }
    }
}

#[async_trait]
impl ResponseValidator for SchemaValidator {
    async fn validate(
        &self,
        gateway: &dyn ModelGateway,
        transcript: &[Turn],
        request: &GenerateRequest,
        parts: Vec<Part>,
    ) -> GatewayResult<Vec<Part>> {
        if Self::conforms(request, &parts) {
            return Ok(parts);
        }

        warn!("Model response did not match the expected shape, attempting recovery call");
        let recovered = gateway.generate_content(transcript, request).await?;
        if !Self::conforms(request, &recovered) {
            debug!("Recovery call still non-conformant, returning as-is");
        }
        Ok(recovered)
    }
}
