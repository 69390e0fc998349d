// ABOUTME: Fallback coordinator wrapping every model gateway call
// ABOUTME: Consent-gated retry loop with validation and cancellation passthrough

use tracing::{info, warn};
use vessel_core::ConfirmGate;

use crate::conversation::{Part, Turn};
use crate::gateway::{GatewayError, GatewayResult, GenerateRequest, ModelGateway};
use crate::validation::ResponseValidator;

/// Options governing the retry behavior of the coordinator
#[derive(Debug, Clone)]
pub struct FallbackOptions {
    /// When true, errors propagate immediately without prompting
    pub disable_fallback: bool,
    /// Non-interactive sessions never prompt and propagate immediately
    pub interactive: bool,
}

impl Default for FallbackOptions {
    fn default() -> Self {
        Self {
            disable_fallback: false,
            interactive: true,
        }
    }
}

/// Issue one gateway call with validation and consent-gated retry.
///
/// Success flows through the validator, which may repair a structurally
/// invalid response with one extra call. Cancellation propagates untouched.
/// Other failures propagate unless the session is interactive and fallback
/// is enabled, in which case the user is asked whether to retry; a decline
/// re-throws the original error. Provider selection is the caller's; the
/// identical request is re-issued on every retry. The loop is unbounded but
/// every turn requires explicit consent.
pub async fn call_with_fallback(
    gateway: &dyn ModelGateway,
    validator: &dyn ResponseValidator,
    gate: &dyn ConfirmGate,
    options: &FallbackOptions,
    transcript: &[Turn],
    request: &GenerateRequest,
) -> GatewayResult<Vec<Part>> {
    loop {
        match gateway.generate_content(transcript, request).await {
            Ok(parts) => {
                return validator
                    .validate(gateway, transcript, request, parts)
                    .await;
            }
            Err(GatewayError::Cancelled) => return Err(GatewayError::Cancelled),
            Err(err) => {
                if options.disable_fallback || !options.interactive {
                    return Err(err);
                }

                warn!("Model call failed: {}", err);
                let decision = gate
                    .confirm(
                        &format!("The model call failed ({}). Retry?", err),
                        false,
                        true,
                    )
                    .await;

                if !decision.confirmed {
                    return Err(err);
                }
                info!("Retrying model call after user confirmation");
            }
        }
    }
}
