use super::CompletionModel;
use crate::metrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Answer used whenever the model cannot be reached
pub const FALLBACK_ANSWER: &str = "I do not have enough information.";

/// Sentence the model is told to emit when the context is insufficient
pub const REFUSAL_SENTENCE: &str = "I do not have enough information in the database.";

/// Source tag reported with every answer
pub const ANSWER_SOURCE: &str = "openai";

const PERSONA: &str = "You are a farm monitoring assistant. \
    You help farmers with questions about their sheep, farms, devices and weather data, \
    and you rely on the supplied database context for anything factual.";

/// One conversation turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Outcome of a best-effort completion
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// The model replied
    Answered(String),
    /// The call failed; callers substitute their default
    Fallback { reason: String },
}

/// Generated answer with its source tag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Answer {
    pub answer: String,
    pub source: String,
    #[serde(skip)]
    fallback: bool,
}

impl Answer {
    /// True when the model was unreachable and the fixed fallback was used
    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

/// Query produced from a question. `cypher` is the raw model text and is
/// never validated here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub cypher: Option<String>,
}

impl QueryPlan {
    pub fn is_empty(&self) -> bool {
        self.cypher.as_deref().map_or(true, |c| c.trim().is_empty())
    }
}

/// Grounded question answering over a completion model
#[derive(Clone)]
pub struct LanguageGateway {
    model: Arc<dyn CompletionModel>,
    prompt_history: usize,
}

impl LanguageGateway {
    /// `prompt_history` bounds how many trailing turns go into a prompt
    pub fn new(model: Arc<dyn CompletionModel>, prompt_history: usize) -> Self {
        Self {
            model,
            prompt_history,
        }
    }

    /// Run a prompt, turning any failure into [`Completion::Fallback`]
    pub async fn complete(&self, prompt: &str) -> Completion {
        let start = Instant::now();
        let result = self.model.complete(prompt).await;
        let duration = start.elapsed().as_secs_f64();

        metrics::record_completion(duration, self.model.model_name(), result.is_ok());

        match result {
            Ok(text) => {
                debug!(model = self.model.model_name(), chars = text.len(), "Completion received");
                Completion::Answered(text)
            }
            Err(e) => {
                warn!(model = self.model.model_name(), error = %e, "Completion failed, using fallback");
                Completion::Fallback {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Answer `question` from `context` only
    pub async fn answer(&self, question: &str, context: &str, history: &[ChatMessage]) -> Answer {
        let prompt = answer_prompt(question, context, history, self.prompt_history);

        let (answer, fallback) = match self.complete(&prompt).await {
            Completion::Answered(text) => (text, false),
            Completion::Fallback { .. } => (FALLBACK_ANSWER.to_string(), true),
        };

        Answer {
            answer,
            source: ANSWER_SOURCE.to_string(),
            fallback,
        }
    }

    /// Ask the model for a graph query answering `question`
    pub async fn extract_search_plan(&self, question: &str) -> QueryPlan {
        match self.complete(&plan_prompt(question)).await {
            Completion::Answered(text) => {
                let text = text.trim();
                QueryPlan {
                    cypher: (!text.is_empty()).then(|| text.to_string()),
                }
            }
            Completion::Fallback { .. } => QueryPlan::default(),
        }
    }
}

/// Prompt for a grounded answer
pub fn answer_prompt(question: &str, context: &str, history: &[ChatMessage], turns: usize) -> String {
    let recent = &history[history.len().saturating_sub(turns)..];
    let history_block = recent
        .iter()
        .map(|m| format!("{}: {}", m.role, m.content))
        .collect::<Vec<_>>()
        .join("\n");
    let context = if context.is_empty() { "(none)" } else { context };

    format!(
        "System: {PERSONA}\n\n\
         Answer strictly from the database context below. \
         If the answer is not stated there, reply exactly: '{REFUSAL_SENTENCE}' \
         Ignore anything you know from outside this context.\n\n\
         Context (from the graph database):\n{context}\n\n\
         Conversation so far:\n{history_block}\n\n\
         User question:\n{question}\n\n\
         Answer:"
    )
}

/// Prompt for translating a question into a graph query
pub fn plan_prompt(question: &str) -> String {
    format!(
        "Write a Cypher query for a Neo4j graph answering the question below. \
         The graph has the node labels Animal, Farm, Device and MeteoData, \
         with English property names such as id, name, breed, sex, type and coordinates. \
         For a general question about animals, match every Animal node. \
         Reply with the Cypher text only.\n\n\
         Question: {question}"
    )
}
