//! # Text Generation Seam
//!
//! Forecasts, reorder hints and free-text reports come from a hosted
//! language model. The ledger only defines the seam: a prompt, optional
//! business data as JSON context, optional response schema, and the chat
//! history so far. Providers live outside this crate.
//!
//! ```text
//! Conversation ──ask(generator, "why is rice low?")──► Conversation'
//!   turns: []                                           turns: [User, Assistant]
//! ```
//!
//! A `Conversation` is a plain value owned by the caller. Asking returns a
//! new conversation; the one passed in is left as it was, so a failed
//! request loses nothing.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::engine::SaleLedgerEngine;
use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

/// One request to a text generator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub prompt: String,
    /// Business data the answer should be based on.
    pub context: Option<Value>,
    /// JSON schema the reply must follow.
    pub response_schema: Option<Value>,
    pub history: Vec<ChatTurn>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>) -> Self {
        GenerationRequest {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_context(mut self, context: Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// A service that turns a prompt into text.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, request: GenerationRequest) -> LedgerResult<String>;
}

/// Asks for JSON and decodes it into `T`.
///
/// Models often wrap JSON in a Markdown code fence; the fence is stripped
/// before parsing.
pub async fn generate_structured<T, G>(generator: &G, request: GenerationRequest) -> LedgerResult<T>
where
    T: DeserializeOwned,
    G: TextGenerator + ?Sized,
{
    let reply = generator.generate(request).await?;
    serde_json::from_str(strip_code_fence(&reply))
        .map_err(|e| LedgerError::Generation(format!("reply is not the expected JSON: {e}")))
}

fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(body) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (```json) up to the first newline.
    let body = body.split_once('\n').map_or("", |(_, rest)| rest);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Chat history owned by the caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub context: Option<Value>,
    pub turns: Vec<ChatTurn>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A conversation grounded on business data, sent with every question.
    pub fn with_context(context: Value) -> Self {
        Conversation {
            context: Some(context),
            turns: Vec::new(),
        }
    }

    /// Sends `message` with the history so far and returns the conversation
    /// extended by the question and the reply.
    pub async fn ask<G>(&self, generator: &G, message: &str) -> LedgerResult<Conversation>
    where
        G: TextGenerator + ?Sized,
    {
        let message = message.trim();
        if message.is_empty() {
            return Err(shopkeep_core::ValidationError::required("message").into());
        }

        let reply = generator
            .generate(GenerationRequest {
                prompt: message.to_string(),
                context: self.context.clone(),
                response_schema: None,
                history: self.turns.clone(),
            })
            .await?;

        let mut next = self.clone();
        next.turns.push(ChatTurn {
            role: ChatRole::User,
            text: message.to_string(),
        });
        next.turns.push(ChatTurn {
            role: ChatRole::Assistant,
            text: reply,
        });
        Ok(next)
    }

    pub fn last_reply(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|turn| turn.role == ChatRole::Assistant)
            .map(|turn| turn.text.as_str())
    }
}

impl SaleLedgerEngine {
    /// Today's overview as JSON, for use as generation context.
    pub async fn overview_context(&self) -> LedgerResult<Value> {
        Ok(serde_json::to_value(self.daily_overview().await?)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Replies with a canned text and remembers what it was asked.
    struct Scripted {
        reply: Result<String, String>,
        seen: Mutex<Vec<GenerationRequest>>,
    }

    impl Scripted {
        fn replying(reply: &str) -> Self {
            Scripted {
                reply: Ok(reply.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }

        fn failing(reason: &str) -> Self {
            Scripted {
                reply: Err(reason.to_string()),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl TextGenerator for Scripted {
        async fn generate(&self, request: GenerationRequest) -> LedgerResult<String> {
            self.seen.lock().unwrap().push(request);
            self.reply.clone().map_err(LedgerError::Generation)
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Reorder {
        product: String,
        quantity: i64,
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("  {\"a\":1} "), "{\"a\":1}");
        assert_eq!(strip_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fence("```\n[1, 2]\n```\n"), "[1, 2]");
    }

    #[tokio::test]
    async fn test_generate_structured_parses_fenced_json() {
        let generator = Scripted::replying("```json\n{\"product\": \"Rice 5kg\", \"quantity\": 20}\n```");
        let request = GenerationRequest::new("What should I reorder?")
            .with_context(json!({ "low_stock": ["Rice 5kg"] }))
            .with_schema(json!({ "type": "object" }));

        let reorder: Reorder = generate_structured(&generator, request).await.unwrap();
        assert_eq!(
            reorder,
            Reorder {
                product: "Rice 5kg".into(),
                quantity: 20
            }
        );

        let seen = generator.seen.lock().unwrap();
        assert_eq!(seen[0].context, Some(json!({ "low_stock": ["Rice 5kg"] })));
        assert!(seen[0].response_schema.is_some());
    }

    #[tokio::test]
    async fn test_generate_structured_rejects_prose() {
        let generator = Scripted::replying("You should reorder rice.");
        let err = generate_structured::<Reorder, _>(&generator, GenerationRequest::new("?"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Generation(_)));
    }

    #[tokio::test]
    async fn test_ask_returns_extended_conversation() {
        let generator = Scripted::replying("Sales were up 10%.");
        let start = Conversation::with_context(json!({ "total": "120.00" }));

        let next = start.ask(&generator, "  How was today? ").await.unwrap();

        assert!(start.turns.is_empty());
        assert_eq!(next.turns.len(), 2);
        assert_eq!(next.turns[0].text, "How was today?");
        assert_eq!(next.last_reply(), Some("Sales were up 10%."));

        let again = next.ask(&generator, "And yesterday?").await.unwrap();
        assert_eq!(again.turns.len(), 4);

        let seen = generator.seen.lock().unwrap();
        assert!(seen[0].history.is_empty());
        assert_eq!(seen[1].history, next.turns);
        assert_eq!(seen[1].context, Some(json!({ "total": "120.00" })));
    }

    #[tokio::test]
    async fn test_failed_ask_leaves_conversation_usable() {
        let generator = Scripted::failing("quota exceeded");
        let start = Conversation::new();

        let err = start.ask(&generator, "Hello").await.unwrap_err();
        assert!(matches!(err, LedgerError::Generation(ref m) if m == "quota exceeded"));
        assert!(start.turns.is_empty());
        assert_eq!(start.last_reply(), None);
    }

    #[tokio::test]
    async fn test_blank_question_is_rejected() {
        let generator = Scripted::replying("unused");
        let err = Conversation::new().ask(&generator, "   ").await.unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
        assert!(generator.seen.lock().unwrap().is_empty());
    }
}
