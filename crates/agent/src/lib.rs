//! Model gateways, the tool-augmented conversation loop, and HTML generation.

pub mod anthropic;
pub mod bedrock;
pub mod dashboard;
pub mod llm;
pub mod prompts;
pub mod runtime;
pub mod sigv4;
mod wire;

/// Anthropic Messages API provider.
pub use anthropic::AnthropicProvider;
/// AWS Bedrock runtime provider and its auth modes.
pub use bedrock::{BedrockAuth, BedrockProvider};
/// Dashboard and chart generation.
pub use dashboard::DashboardService;
/// Model gateway interface.
pub use llm::{MessageRequest, ModelGateway};
/// Conversation loop.
pub use runtime::{ConversationRuntime, DEFAULT_MAX_ITERATIONS, LoopMode, LoopResult};
/// Static AWS credentials for SigV4.
pub use sigv4::AwsCredentials;
