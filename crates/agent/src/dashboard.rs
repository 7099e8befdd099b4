//! Single-shot HTML dashboard and chart generation.

use std::sync::Arc;

use markup::{MarkupSanitizer, SizeLimits};
use proto::{Message, ModelError};
use tracing::{debug, info};

use crate::llm::{MessageRequest, ModelGateway};
use crate::prompts;

/// Turns analysis text into a size-bounded HTML page via the model.
pub struct DashboardService {
    gateway: Arc<dyn ModelGateway>,
    sanitizer: MarkupSanitizer,
}

impl DashboardService {
    pub fn new(gateway: Arc<dyn ModelGateway>, limits: SizeLimits) -> Self {
        Self {
            gateway,
            sanitizer: MarkupSanitizer::new(limits),
        }
    }

    /// Generates a multi-chart dashboard for `content`.
    pub async fn generate_dashboard(&self, content: &str) -> Result<String, ModelError> {
        let limits = self.sanitizer.limits();
        self.generate(
            "dashboard",
            prompts::dashboard_system_prompt(limits.max_width, limits.max_height),
            prompts::dashboard_user_message(content),
        )
        .await
    }

    /// Generates one chart for `content`.
    pub async fn generate_chart(&self, content: &str) -> Result<String, ModelError> {
        let limits = self.sanitizer.limits();
        self.generate(
            "chart",
            prompts::chart_system_prompt(limits.max_width, limits.max_height),
            prompts::chart_user_message(content),
        )
        .await
    }

    async fn generate(
        &self,
        kind: &'static str,
        system: String,
        user_message: String,
    ) -> Result<String, ModelError> {
        debug!(kind, chars = user_message.chars().count(), "Generating HTML");
        let req = MessageRequest::new(vec![Message::user(user_message)]).with_system(system);
        let reply = self.gateway.create_message(req).await?;
        let html = reply.joined_text();
        let sanitized = self.sanitizer.sanitize(&html);
        info!(
            kind,
            bytes = sanitized.len(),
            clamped = sanitized != html,
            output_tokens = reply.usage.output_tokens,
            "HTML generated"
        );
        Ok(sanitized)
    }
}
