use std::sync::Arc;

use agent::{BedrockAuth, BedrockProvider, ConversationRuntime, DashboardService, ModelGateway};
use tools::McpBridge;

use crate::dto::ValidateModelRequest;

/// Builds a throwaway gateway for `/api/settings/model/validate`.
pub type GatewayFactory = Arc<dyn Fn(&ValidateModelRequest) -> Arc<dyn ModelGateway> + Send + Sync>;

/// Shared state behind every handler.
pub struct AppState {
    pub runtime: ConversationRuntime,
    pub dashboard: DashboardService,
    /// Reconnected on demand before each chat when set.
    pub reconnect: Option<Arc<McpBridge>>,
    pub gateway_factory: GatewayFactory,
}

impl AppState {
    pub fn new(runtime: ConversationRuntime, dashboard: DashboardService) -> Self {
        Self {
            runtime,
            dashboard,
            reconnect: None,
            gateway_factory: bedrock_gateway_factory(),
        }
    }

    pub fn with_reconnect(mut self, bridge: Option<Arc<McpBridge>>) -> Self {
        self.reconnect = bridge;
        self
    }

    pub fn with_gateway_factory(mut self, factory: GatewayFactory) -> Self {
        self.gateway_factory = factory;
        self
    }
}

/// Bedrock gateway authenticated with the submitted bearer token.
pub fn bedrock_gateway_factory() -> GatewayFactory {
    Arc::new(|req: &ValidateModelRequest| {
        Arc::new(BedrockProvider::new(
            BedrockAuth::Bearer(req.bearer_token.clone()),
            req.region.trim(),
            req.model_id.trim(),
            req.max_tokens,
        )) as Arc<dyn ModelGateway>
    })
}
