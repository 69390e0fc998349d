// ABOUTME: Conversation model, gateway abstraction, and fallback coordination
// ABOUTME: Provider-agnostic seam between the task loop and model SDKs

pub mod conversation;
pub mod fallback;
pub mod gateway;
pub mod validation;

// Re-export conversation types
pub use conversation::{Part, ToolCall, ToolResult, Turn};

// Re-export gateway types
pub use gateway::{
    FunctionDef, GatewayError, GatewayResult, GenerateRequest, ModelGateway, ModelTier,
    ResponseType,
};

// Re-export fallback coordination
pub use fallback::{call_with_fallback, FallbackOptions};

// Re-export validation
pub use validation::{PassthroughValidator, ResponseValidator, SchemaValidator};
