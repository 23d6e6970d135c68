//! Multi-step tool calling with a streamed text answer.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use super::{
    ChatModel, ChatRequest, LlmError, Message, StreamEvent, TextStream, ToolCall, ToolSchema,
};

/// Capabilities offered to the model, executed when it asks for them.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    fn schemas(&self) -> Vec<ToolSchema>;

    /// Always answers with text; failures are described, not raised, so the
    /// model can read them.
    async fn execute(&self, name: &str, arguments: &str) -> String;
}

#[derive(Debug, Default)]
struct PartialCall {
    id: String,
    name: String,
    arguments: String,
}

/// Reassembles tool calls from streamed fragments, keyed by index.
#[derive(Debug, Default)]
struct ToolCallAssembler {
    calls: BTreeMap<usize, PartialCall>,
}

impl ToolCallAssembler {
    fn push(&mut self, index: usize, id: Option<String>, name: Option<String>, arguments: &str) {
        let call = self.calls.entry(index).or_default();
        if let Some(id) = id.filter(|id| !id.is_empty()) {
            call.id = id;
        }
        if let Some(name) = name.filter(|name| !name.is_empty()) {
            call.name = name;
        }
        call.arguments.push_str(arguments);
    }

    fn finish(self) -> Vec<ToolCall> {
        self.calls
            .into_iter()
            .filter(|(_, call)| !call.name.is_empty())
            .map(|(index, call)| {
                let id = if call.id.is_empty() {
                    format!("call_{index}")
                } else {
                    call.id
                };
                ToolCall::new(id, call.name, call.arguments)
            })
            .collect()
    }
}

/// Runs a prompt against a model with tools for at most `max_steps` rounds.
#[derive(Clone)]
pub struct ToolAgent {
    model: Arc<dyn ChatModel>,
    tools: Arc<dyn ToolExecutor>,
    system: Option<String>,
    max_steps: usize,
}

impl ToolAgent {
    pub fn new(model: Arc<dyn ChatModel>, tools: Arc<dyn ToolExecutor>) -> Self {
        Self {
            model,
            tools,
            system: None,
            max_steps: 1,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Clamped to at least one step.
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps.max(1);
        self
    }

    /// Streams the model's text as it arrives. Requested tools are executed
    /// between steps; the stream ends after the last step or on the first error.
    pub fn stream_text(&self, prompt: &str) -> TextStream {
        let (tx, rx) = mpsc::channel(64);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));

        let agent = self.clone();
        tokio::spawn(async move {
            if let Err(err) = agent.drive(messages, &tx).await {
                let _ = tx.send(Err(err)).await;
            }
        });

        Box::pin(ReceiverStream::new(rx))
    }

    /// Collects [`ToolAgent::stream_text`] into one string.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, LlmError> {
        let mut stream = self.stream_text(prompt);
        let mut text = String::new();
        while let Some(chunk) = stream.next().await {
            text.push_str(&chunk?);
        }
        Ok(text)
    }

    async fn drive(
        &self,
        mut messages: Vec<Message>,
        tx: &mpsc::Sender<Result<String, LlmError>>,
    ) -> Result<(), LlmError> {
        let schemas = self.tools.schemas();

        for step in 1..=self.max_steps {
            let request = ChatRequest::new(messages.clone()).with_tools(schemas.clone());
            let mut events = self.model.stream(&request).await?;

            let mut text = String::new();
            let mut assembler = ToolCallAssembler::default();

            while let Some(event) = events.next().await {
                match event? {
                    StreamEvent::Text(chunk) => {
                        text.push_str(&chunk);
                        if tx.send(Ok(chunk)).await.is_err() {
                            debug!("text stream dropped by consumer");
                            return Ok(());
                        }
                    }
                    StreamEvent::ToolCallDelta {
                        index,
                        id,
                        name,
                        arguments,
                    } => {
                        assembler.push(index, id, name, &arguments);
                    }
                    StreamEvent::Usage(usage) => {
                        debug!(
                            step,
                            input = usage.prompt_tokens,
                            output = usage.completion_tokens,
                            "token usage"
                        );
                    }
                }
            }

            let calls = assembler.finish();
            if calls.is_empty() {
                return Ok(());
            }

            messages.push(Message::assistant_tool_calls(text, calls.clone()));
            for call in calls {
                info!(step, tool = %call.function.name, "executing tool call");
                let output = self
                    .tools
                    .execute(&call.function.name, &call.function.arguments)
                    .await;
                debug!(tool = %call.function.name, %output, "tool output");
                messages.push(Message::tool(call.id, output));
            }
        }

        Ok(())
    }
}
