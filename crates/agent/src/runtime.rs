//! Tool-augmented conversation loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use proto::{ContentBlock, Message, ModelError, ModelReply, TokenUsage, ToolDescriptor};
use tools::ToolBridge;
use tracing::{Instrument, debug, info, info_span, warn};

use crate::llm::{MessageRequest, ModelGateway};
use crate::prompts;

/// Default bound on tool rounds per request.
pub const DEFAULT_MAX_ITERATIONS: usize = 20;

/// Whether tools were offered to the model for this request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopMode {
    /// Tools were listed and offered.
    ToolAugmented,
    /// No tools offered: no bridge, bridge disconnected, listing failed, or empty listing.
    Fallback,
}

/// Outcome of one loop invocation.
#[derive(Debug, Clone)]
pub struct LoopResult {
    /// Text of every processed model turn, joined with newlines.
    pub text: String,
    /// Completed tool rounds; never exceeds the configured bound.
    pub iterations: usize,
    /// Number of model calls made, one more than `iterations` when the
    /// last reply asked for no tools.
    pub model_calls: usize,
    /// Number of tool invocations, failed ones included.
    pub tool_calls: usize,
    /// Token usage summed over all model calls.
    pub usage: TokenUsage,
    /// Wall time of the whole loop.
    pub duration: Duration,
    pub mode: LoopMode,
}

/// Prompt and tool set chosen for one request.
struct Plan {
    mode: LoopMode,
    system: String,
    tools: Vec<ToolDescriptor>,
}

/// Drives model calls and tool executions for one conversation at a time.
///
/// The runtime holds no per-request state, so a single instance can serve
/// concurrent requests.
pub struct ConversationRuntime {
    gateway: Arc<dyn ModelGateway>,
    bridge: Option<Arc<dyn ToolBridge>>,
    max_iterations: usize,
    default_view_id: Option<String>,
    tool_markers: bool,
}

impl ConversationRuntime {
    /// Creates a runtime. `max_iterations` is clamped to at least one.
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        bridge: Option<Arc<dyn ToolBridge>>,
        max_iterations: usize,
    ) -> Self {
        Self {
            gateway,
            bridge,
            max_iterations: max_iterations.max(1),
            default_view_id: None,
            tool_markers: false,
        }
    }

    /// Points "this view" questions at a fixed view id in the tool prompt.
    pub fn with_default_view_id(mut self, view_id: Option<String>) -> Self {
        self.default_view_id = view_id;
        self
    }

    /// Adds a `[ツール実行: name]` line to the answer for every tool run.
    pub fn with_tool_markers(mut self, enabled: bool) -> Self {
        self.tool_markers = enabled;
        self
    }

    /// Returns the configured bound on tool rounds.
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    /// Produces the final answer text for `messages`.
    ///
    /// Tool failures are fed back to the model as error results; a model
    /// failure aborts the loop.
    pub async fn process(&self, messages: Vec<Message>) -> Result<LoopResult, ModelError> {
        let span = info_span!(
            "conversation",
            model = %self.gateway.model_id(),
            history = messages.len(),
            iterations = tracing::field::Empty,
            model_calls = tracing::field::Empty,
            tool_calls = tracing::field::Empty,
            input_tokens = tracing::field::Empty,
            output_tokens = tracing::field::Empty,
        );
        let result = self.run(messages).instrument(span.clone()).await?;
        span.record("iterations", result.iterations);
        span.record("model_calls", result.model_calls);
        span.record("tool_calls", result.tool_calls);
        span.record("input_tokens", result.usage.input_tokens);
        span.record("output_tokens", result.usage.output_tokens);
        Ok(result)
    }

    async fn run(&self, mut messages: Vec<Message>) -> Result<LoopResult, ModelError> {
        let t0 = Instant::now();
        let plan = self.plan().await;
        debug!(mode = ?plan.mode, tools = plan.tools.len(), "Conversation plan selected");

        let mut usage = TokenUsage::default();
        let mut segments: Vec<String> = Vec::new();
        let mut tool_calls = 0usize;
        let mut rounds = 0usize;
        let mut model_calls = 1usize;

        let mut reply = self.call_model(&messages, &plan, &mut usage).await?;

        loop {
            segments.extend(reply.text_segments().into_iter().map(str::to_string));

            let uses: Vec<(String, String, serde_json::Value)> = reply
                .tool_uses()
                .into_iter()
                .map(|(id, name, input)| (id.to_string(), name.to_string(), input.clone()))
                .collect();

            if uses.is_empty() || plan.tools.is_empty() {
                break;
            }
            if rounds >= self.max_iterations {
                warn!(
                    max_iterations = self.max_iterations,
                    pending_tool_uses = uses.len(),
                    "Max tool rounds reached, returning accumulated text"
                );
                break;
            }

            let Some(bridge) = self.bridge.as_ref() else {
                break;
            };

            messages.push(Message::assistant_blocks(reply.content));

            let mut results = Vec::with_capacity(uses.len());
            for (id, name, input) in uses {
                if self.tool_markers {
                    segments.push(format!("[ツール実行: {name}]"));
                }
                results.push(execute_tool(bridge.as_ref(), &id, &name, input).await);
                tool_calls += 1;
            }
            messages.push(Message::tool_results(results));
            rounds += 1;

            debug!(round = rounds, "Tool round complete, re-asking model");
            reply = self.call_model(&messages, &plan, &mut usage).await?;
            model_calls += 1;
        }

        let result = LoopResult {
            text: segments.join("\n"),
            iterations: rounds,
            model_calls,
            tool_calls,
            usage,
            duration: t0.elapsed(),
            mode: plan.mode,
        };
        info!(
            iterations = result.iterations,
            model_calls = result.model_calls,
            tool_calls = result.tool_calls,
            total_tokens = result.usage.total(),
            elapsed_ms = %result.duration.as_millis(),
            "Conversation finished"
        );
        Ok(result)
    }

    async fn plan(&self) -> Plan {
        let fallback = || Plan {
            mode: LoopMode::Fallback,
            system: prompts::SIMPLE_CHAT_FALLBACK_PROMPT.to_string(),
            tools: Vec::new(),
        };

        let Some(bridge) = self.bridge.as_ref() else {
            return fallback();
        };
        if !bridge.is_connected() {
            debug!("Tool bridge disconnected, using fallback chat");
            return fallback();
        }

        match bridge.list_tools().await {
            Ok(tools) if tools.is_empty() => Plan {
                mode: LoopMode::Fallback,
                system: prompts::ANALYSIS_FALLBACK_PROMPT.to_string(),
                tools,
            },
            Ok(tools) => Plan {
                mode: LoopMode::ToolAugmented,
                system: prompts::tool_system_prompt(self.default_view_id.as_deref()),
                tools,
            },
            Err(e) => {
                warn!(error = %e, "Tool listing failed, using fallback chat");
                fallback()
            }
        }
    }

    async fn call_model(
        &self,
        messages: &[Message],
        plan: &Plan,
        usage: &mut TokenUsage,
    ) -> Result<ModelReply, ModelError> {
        let req = MessageRequest::new(messages.to_vec())
            .with_system(plan.system.clone())
            .with_tools(plan.tools.clone());
        let t0 = Instant::now();
        let reply = self.gateway.create_message(req).await?;
        usage.add(&reply.usage);
        debug!(
            elapsed_ms = %t0.elapsed().as_millis(),
            stop_reason = ?reply.stop_reason,
            "Model response received"
        );
        Ok(reply)
    }
}

async fn execute_tool(
    bridge: &dyn ToolBridge,
    id: &str,
    name: &str,
    input: serde_json::Value,
) -> ContentBlock {
    debug!(tool = %name, input = %input, "Executing tool");
    let t0 = Instant::now();
    match bridge.call_tool(name, input).await {
        Ok(output) => {
            debug!(
                tool = %name,
                is_error = output.is_error,
                elapsed_ms = %t0.elapsed().as_millis(),
                "Tool finished"
            );
            output.into_result_block(id)
        }
        Err(e) => {
            warn!(tool = %name, error = %e, "Tool execution failed");
            ContentBlock::tool_error(id, format!("ツールの実行でエラーが発生しました: {e}"))
        }
    }
}
