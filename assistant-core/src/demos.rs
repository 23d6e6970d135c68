//! Small single-call uses of a [`ChatModel`]: generation, streaming,
//! summarisation, conversation history, structured output and tool calling.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info};

use crate::llm::{
    ChatModel, ChatRequest, ChatResponse, LlmError, Message, StreamEvent, TextStream, ToolAgent,
    ToolExecutor, ToolSchema,
};

const SUMMARIZER_PROMPT: &str = "You are a text summarizer. \
    Summarize the text you receive. \
    Be concise. \
    Return only the summary. \
    Do not use the phrase \"here is a summary\". \
    Highlight relevant phrases in bold. \
    The summary should be two sentences long.";

const RECIPE_PROMPT: &str = "You are helping a user create a recipe. \
    Use British English variants of ingredient names, like Coriander over Cilantro. \
    Answer with a JSON object of the form \
    {\"recipe\": {\"name\": string, \
    \"ingredients\": [{\"name\": string, \"amount\": string}], \
    \"steps\": [string]}}.";

const LOGGER_PROMPT: &str = "Your only role in life is to log messages to the console. \
    Use the tool provided to log the prompt to the console.";

async fn complete_text(
    model: &dyn ChatModel,
    messages: Vec<Message>,
) -> Result<String, LlmError> {
    match model.complete(&ChatRequest::new(messages)).await? {
        ChatResponse::Content(text) => Ok(text),
        ChatResponse::ToolCalls(calls) => Err(LlmError::Unexpected(format!(
            "model requested {} tool call(s) without tools",
            calls.len()
        ))),
    }
}

pub async fn generate_text(model: &dyn ChatModel, prompt: &str) -> Result<String, LlmError> {
    complete_text(model, vec![Message::user(prompt)]).await
}

/// Text chunks of the answer, in arrival order.
pub async fn stream_text(model: &dyn ChatModel, prompt: &str) -> Result<TextStream, LlmError> {
    let request = ChatRequest::new(vec![Message::user(prompt)]);
    let events = model.stream(&request).await?;
    let text = events.filter_map(|event| async move {
        match event {
            Ok(StreamEvent::Text(chunk)) => Some(Ok(chunk)),
            Ok(_) => None,
            Err(err) => Some(Err(err)),
        }
    });
    Ok(Box::pin(text))
}

/// Two-sentence summary with key phrases in bold.
pub async fn summarize(model: &dyn ChatModel, text: &str) -> Result<String, LlmError> {
    let messages = vec![Message::system(SUMMARIZER_PROMPT), Message::user(text)];
    complete_text(model, messages).await
}

/// The seeded greeting exchange used by the `chat` command.
pub fn greeting_history() -> Vec<Message> {
    vec![
        Message::system("Vous êtes un accueillant sympathique."),
        Message::user("Bonjour, toi !"),
        Message::assistant("Salut !"),
    ]
}

/// Sends the whole history and returns it with the model's reply appended.
pub async fn continue_conversation(
    model: &dyn ChatModel,
    mut history: Vec<Message>,
) -> Result<Vec<Message>, LlmError> {
    let reply = complete_text(model, history.clone()).await?;
    history.push(Message::assistant(reply));
    Ok(history)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    pub ingredients: Vec<Ingredient>,
    pub steps: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RecipeEnvelope {
    recipe: Recipe,
}

/// Asks for a recipe as JSON and validates it against [`Recipe`].
pub async fn create_recipe(model: &dyn ChatModel, prompt: &str) -> Result<Recipe, LlmError> {
    let request =
        ChatRequest::new(vec![Message::system(RECIPE_PROMPT), Message::user(prompt)]).json();

    let text = match model.complete(&request).await? {
        ChatResponse::Content(text) => text,
        ChatResponse::ToolCalls(_) => {
            return Err(LlmError::Unexpected("tool calls instead of a recipe".into()));
        }
    };
    debug!(%text, "structured response");

    let envelope: RecipeEnvelope = serde_json::from_str(&text)
        .map_err(|e| LlmError::Parse(format!("{e} - content: {text}")))?;
    Ok(envelope.recipe)
}

/// `logToConsole`: records every message the model asks to log.
#[derive(Debug, Default)]
pub struct ConsoleLogger {
    logged: Mutex<Vec<String>>,
}

impl ConsoleLogger {
    pub fn logged(&self) -> Vec<String> {
        self.logged.lock().map(|l| l.clone()).unwrap_or_default()
    }
}

#[derive(Debug, Deserialize)]
struct LogArgs {
    message: String,
}

#[async_trait]
impl ToolExecutor for ConsoleLogger {
    fn schemas(&self) -> Vec<ToolSchema> {
        vec![ToolSchema {
            name: "logToConsole".to_string(),
            description: "Log a message to the console".to_string(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "The message to log to the console"
                    }
                },
                "required": ["message"]
            }),
        }]
    }

    async fn execute(&self, name: &str, arguments: &str) -> String {
        if name != "logToConsole" {
            return format!("Unknown tool '{name}'.");
        }
        match serde_json::from_str::<LogArgs>(arguments) {
            Ok(args) => {
                info!(message = %args.message, "logToConsole");
                if let Ok(mut logged) = self.logged.lock() {
                    logged.push(args.message);
                }
                "Logged.".to_string()
            }
            Err(e) => format!("Invalid arguments for {name}: {e}"),
        }
    }
}

/// Lets the model log `prompt` through its only tool; returns what was logged.
pub async fn log_to_console(
    model: Arc<dyn ChatModel>,
    prompt: &str,
) -> Result<Vec<String>, LlmError> {
    let logger = Arc::new(ConsoleLogger::default());
    ToolAgent::new(model, logger.clone())
        .with_system(LOGGER_PROMPT)
        .generate_text(prompt)
        .await?;
    Ok(logger.logged())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::Role;
    use crate::testing::ScriptedModel;

    fn text(s: &str) -> StreamEvent {
        StreamEvent::Text(s.to_string())
    }

    #[tokio::test]
    async fn generate_text_sends_single_user_message() {
        let model = ScriptedModel::new(vec![Ok(vec![text("H2O")])]);
        let answer = generate_text(&model, "formula of water?").await.unwrap();
        assert_eq!(answer, "H2O");
        assert_eq!(
            model.requests()[0].messages,
            vec![Message::user("formula of water?")]
        );
    }

    #[tokio::test]
    async fn stream_text_yields_only_text() {
        let model = ScriptedModel::new(vec![Ok(vec![
            text("a"),
            StreamEvent::Usage(Default::default()),
            text("b"),
        ])]);
        let chunks: Vec<String> = stream_text(&model, "hi")
            .await
            .unwrap()
            .map(Result::unwrap)
            .collect()
            .await;
        assert_eq!(chunks, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn summarize_uses_system_prompt() {
        let model = ScriptedModel::new(vec![Ok(vec![text("**Short**.")])]);
        summarize(&model, "long text").await.unwrap();
        let messages = &model.requests()[0].messages;
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("two sentences"));
        assert_eq!(messages[1], Message::user("long text"));
    }

    #[tokio::test]
    async fn conversation_appends_reply() {
        let model = ScriptedModel::new(vec![Ok(vec![text("Ça va ?")])]);
        let history = continue_conversation(&model, greeting_history())
            .await
            .unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history[3], Message::assistant("Ça va ?"));
        assert_eq!(model.requests()[0].messages.len(), 3);
    }

    #[tokio::test]
    async fn recipe_is_parsed_from_json() {
        let body = r#"{"recipe":{
            "name":"Baba ganoush",
            "ingredients":[{"name":"Aubergine","amount":"2"}],
            "steps":["Roast","Blend"]
        }}"#;
        let model = ScriptedModel::new(vec![Ok(vec![text(body)])]);
        let recipe = create_recipe(&model, "baba ganoush").await.unwrap();
        assert_eq!(recipe.name, "Baba ganoush");
        assert_eq!(recipe.ingredients[0].name, "Aubergine");
        assert_eq!(recipe.steps.len(), 2);
        assert!(model.requests()[0].json_output);
    }

    #[tokio::test]
    async fn malformed_recipe_is_a_parse_error() {
        let model = ScriptedModel::new(vec![Ok(vec![text("{\"name\": \"soup\"}")])]);
        let err = create_recipe(&model, "soup").await.unwrap_err();
        assert!(matches!(err, LlmError::Parse(_)));
    }

    #[tokio::test]
    async fn log_to_console_runs_the_tool() {
        let model = Arc::new(ScriptedModel::new(vec![Ok(vec![StreamEvent::ToolCallDelta {
            index: 0,
            id: Some("c1".into()),
            name: Some("logToConsole".into()),
            arguments: r#"{"message":"Hello, world!"}"#.into(),
        }])]));
        let logged = log_to_console(model.clone(), "Hello, world!")
            .await
            .unwrap();
        assert_eq!(logged, vec!["Hello, world!"]);
        assert_eq!(model.requests().len(), 1);
    }

    #[tokio::test]
    async fn logger_rejects_bad_calls() {
        let logger = ConsoleLogger::default();
        assert_eq!(logger.execute("other", "{}").await, "Unknown tool 'other'.");
        assert!(
            logger
                .execute("logToConsole", "{}")
                .await
                .starts_with("Invalid arguments")
        );
        assert!(logger.logged().is_empty());
    }
}
