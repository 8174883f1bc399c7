//! Question answering over the indexed stores.
//!
//! A question is classified by keyword membership into one of three
//! contexts, which selects a [`MergeStrategy`] for ordering the retrieved
//! document and schema results. The top unit of the merged ordering is
//! the extractive answer; when a generative model is configured, the
//! merged context is instead fed through a prompt template and the model's
//! output becomes the answer. Each answered exchange is recorded in the
//! memory store (best-effort — a memory write failure does not fail the
//! answer).

use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::GenerationConfig;
use crate::model::{meta, ContentUnit, StoreClass};
use crate::router::HybridRouter;

/// Keywords marking a question as schema-like.
pub const SCHEMA_KEYWORDS: &[&str] = &[
    "schema",
    "table",
    "column",
    "relationship",
    "database",
    "sql",
    "json",
];

/// Keywords marking a question as customer-like.
pub const CUSTOMER_KEYWORDS: &[&str] = &[
    "customer", "client", "account", "service", "settings", "billing",
];

/// Fixed sentinel returned when no indexed unit matches a question.
pub const NO_ANSWER: &str = "I couldn't find specific information to answer your question.";

/// Context classification of an incoming question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionContext {
    SchemaLike,
    CustomerLike,
    General,
}

/// Classify a question by keyword membership. Schema keywords win over
/// customer keywords when both are present.
pub fn classify_question(question: &str) -> QuestionContext {
    let lower = question.to_lowercase();
    if SCHEMA_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        QuestionContext::SchemaLike
    } else if CUSTOMER_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        QuestionContext::CustomerLike
    } else {
        QuestionContext::General
    }
}

/// Ordering rule applied to the retrieved document and schema results.
///
/// Strategies only reorder across the two result lists; within each list
/// the backend's native similarity order is preserved.
pub trait MergeStrategy: Send + Sync {
    fn name(&self) -> &'static str;
    fn merge(&self, document: Vec<ContentUnit>, schema: Vec<ContentUnit>) -> Vec<ContentUnit>;
}

/// Schema results before document results.
pub struct SchemaPriority;

impl MergeStrategy for SchemaPriority {
    fn name(&self) -> &'static str {
        "schema_priority"
    }

    fn merge(&self, document: Vec<ContentUnit>, schema: Vec<ContentUnit>) -> Vec<ContentUnit> {
        let mut merged = schema;
        merged.extend(document);
        merged
    }
}

/// Customer-tagged document results first, then schema results, then the
/// remaining document results.
pub struct CustomerPriority;

impl MergeStrategy for CustomerPriority {
    fn name(&self) -> &'static str {
        "customer_priority"
    }

    fn merge(&self, document: Vec<ContentUnit>, schema: Vec<ContentUnit>) -> Vec<ContentUnit> {
        let (customer, rest): (Vec<ContentUnit>, Vec<ContentUnit>) =
            document.into_iter().partition(|unit| {
                unit.business_context()
                    .map(|ctx| ctx.contains("customer"))
                    .unwrap_or(false)
            });

        let mut merged = customer;
        merged.extend(schema);
        merged.extend(rest);
        merged
    }
}

/// Document results before schema results (the default).
pub struct DefaultPriority;

impl MergeStrategy for DefaultPriority {
    fn name(&self) -> &'static str {
        "default_priority"
    }

    fn merge(&self, document: Vec<ContentUnit>, schema: Vec<ContentUnit>) -> Vec<ContentUnit> {
        let mut merged = document;
        merged.extend(schema);
        merged
    }
}

/// Strategy selection for a classified question.
pub fn strategy_for(context: QuestionContext) -> &'static dyn MergeStrategy {
    match context {
        QuestionContext::SchemaLike => &SchemaPriority,
        QuestionContext::CustomerLike => &CustomerPriority,
        QuestionContext::General => &DefaultPriority,
    }
}

// ============ Generative model ============

/// Text-generation capability used to refine extractive answers.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generation via a local Ollama instance's `/api/generate` endpoint.
pub struct OllamaGenerator {
    model: String,
    url: String,
    temperature: f64,
    timeout_secs: u64,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow::anyhow!("generation.model required for Ollama provider"))?;
        let url = config
            .url
            .clone()
            .unwrap_or_else(|| "http://localhost:11434".to_string());

        Ok(Self {
            model,
            url,
            temperature: config.temperature,
            timeout_secs: config.timeout_secs,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl GenerativeModel for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "stream": false,
            "options": { "temperature": self.temperature },
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = Duration::from_secs(1 << (attempt - 1).min(5));
                tokio::time::sleep(delay).await;
            }

            let resp = client
                .post(format!("{}/api/generate", self.url))
                .header("Content-Type", "application/json")
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        let text = json
                            .get("response")
                            .and_then(|r| r.as_str())
                            .ok_or_else(|| {
                                anyhow::anyhow!("Invalid Ollama response: missing response field")
                            })?;
                        return Ok(text.trim().to_string());
                    }

                    if status.as_u16() == 429 || status.is_server_error() {
                        let body_text = response.text().await.unwrap_or_default();
                        last_err = Some(anyhow::anyhow!(
                            "Ollama API error {}: {}",
                            status,
                            body_text
                        ));
                        continue;
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    bail!("Ollama API error {}: {}", status, body_text);
                }
                Err(e) => {
                    last_err = Some(anyhow::anyhow!(
                        "Ollama connection error (is Ollama running at {}?): {}",
                        self.url,
                        e
                    ));
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow::anyhow!("Ollama generation failed after retries")))
    }
}

/// Create a generator from configuration; `None` when disabled.
pub fn create_generator(config: &GenerationConfig) -> Result<Option<Box<dyn GenerativeModel>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "ollama" => Ok(Some(Box::new(OllamaGenerator::new(config)?))),
        other => bail!("Unknown generation provider: {}", other),
    }
}

// ============ Answering ============

/// An answer with its provenance.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub source: Option<String>,
    pub confidence: &'static str,
}

/// Prompt template for generative refinement of schema answers.
fn build_prompt(context: &[ContentUnit], question: &str) -> String {
    let joined = context
        .iter()
        .map(|u| u.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are a database schema expert. Use the following pieces of context to answer \
         the question about the uploaded data. If you don't know the answer, just say that \
         you don't know, don't try to make up an answer.\n\n\
         Context: {joined}\n\n\
         Question: {question}\n\n\
         Instructions for providing the answer:\n\
         1. Answer ONLY based on the context provided\n\
         2. If the answer involves relationships between tables, explain them clearly\n\
         3. If the answer involves specific fields or columns, list them\n\
         4. If you're unsure about any part of the answer, say so\n\
         5. If the context doesn't contain the answer, say \"I cannot find information \
         about this in the provided schema.\"\n\n\
         Answer: "
    )
}

/// Answer a natural-language question from the indexed stores.
///
/// Retrieval fans out over the schema backend and the combined document
/// mode, merges per the classified strategy, and answers from the top
/// unit (or the generative model when one is provided). The exchange is
/// recorded in the memory store on success.
pub async fn answer_question(
    router: &HybridRouter,
    generator: Option<&dyn GenerativeModel>,
    question: &str,
    k: usize,
) -> Result<Answer> {
    let context = classify_question(question);
    let strategy = strategy_for(context);

    let schema_units = router.search(question, StoreClass::Schema, k).await?;
    let document_units = router.search(question, StoreClass::Document, k).await?;
    let merged = strategy.merge(document_units, schema_units);

    info!(
        strategy = strategy.name(),
        retrieved = merged.len(),
        "retrieved context for question"
    );

    if merged.is_empty() {
        return Ok(Answer {
            text: NO_ANSWER.to_string(),
            source: None,
            confidence: "low",
        });
    }

    let top = &merged[0];
    let source = top.source().map(str::to_string);

    let text = match generator {
        Some(model) => model.generate(&build_prompt(&merged, question)).await?,
        None => top.text.clone(),
    };

    let exchange = ContentUnit::new(format!("Q: {}\nA: {}", question, text))
        .with_meta(meta::TYPE, "qa_exchange")
        .with_meta(meta::CONTENT_CLASS, StoreClass::Memory.as_str())
        .with_meta(meta::QUESTION, question)
        .with_meta(meta::ANSWER, text.clone());
    if let Err(e) = router.add_unit(&exchange, StoreClass::Memory).await {
        warn!(error = %e, "failed to record exchange in memory store");
    }

    Ok(Answer {
        text,
        source,
        confidence: "high",
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::meta;

    fn unit(text: &str, context: Option<&str>) -> ContentUnit {
        let mut u = ContentUnit::new(text);
        if let Some(ctx) = context {
            u.set_meta(meta::BUSINESS_CONTEXT, ctx);
        }
        u
    }

    #[test]
    fn test_classify_schema_like() {
        assert_eq!(
            classify_question("What tables are in the database?"),
            QuestionContext::SchemaLike
        );
        assert_eq!(
            classify_question("show me the SCHEMA"),
            QuestionContext::SchemaLike
        );
    }

    #[test]
    fn test_classify_customer_like() {
        assert_eq!(
            classify_question("Which customers are on the gold tier?"),
            QuestionContext::CustomerLike
        );
        assert_eq!(
            classify_question("billing details please"),
            QuestionContext::CustomerLike
        );
    }

    #[test]
    fn test_classify_general() {
        assert_eq!(
            classify_question("What is the weather like?"),
            QuestionContext::General
        );
    }

    #[test]
    fn test_classify_schema_wins_over_customer() {
        assert_eq!(
            classify_question("Which table stores customer accounts?"),
            QuestionContext::SchemaLike
        );
    }

    #[test]
    fn test_schema_priority_order() {
        let docs = vec![unit("doc", None)];
        let schema = vec![unit("schema", Some("database_schema"))];
        let merged = SchemaPriority.merge(docs, schema);
        assert_eq!(merged[0].text, "schema");
        assert_eq!(merged[1].text, "doc");
    }

    #[test]
    fn test_default_priority_order() {
        let docs = vec![unit("doc", None)];
        let schema = vec![unit("schema", Some("database_schema"))];
        let merged = DefaultPriority.merge(docs, schema);
        assert_eq!(merged[0].text, "doc");
        assert_eq!(merged[1].text, "schema");
    }

    #[test]
    fn test_customer_priority_ranks_tagged_unit_first() {
        // One customer-tagged unit and one untagged unit in the document
        // results: the tagged unit must come first.
        let docs = vec![
            unit("untagged", None),
            unit("acme client record", Some("customer_data")),
        ];
        let schema = vec![unit("schema", Some("database_schema"))];
        let merged = CustomerPriority.merge(docs, schema);

        assert_eq!(merged[0].text, "acme client record");
        assert_eq!(merged[1].text, "schema");
        assert_eq!(merged[2].text, "untagged");
    }

    #[test]
    fn test_strategy_for_contexts() {
        assert_eq!(
            strategy_for(QuestionContext::SchemaLike).name(),
            "schema_priority"
        );
        assert_eq!(
            strategy_for(QuestionContext::CustomerLike).name(),
            "customer_priority"
        );
        assert_eq!(
            strategy_for(QuestionContext::General).name(),
            "default_priority"
        );
    }

    #[test]
    fn test_build_prompt_includes_context_and_question() {
        let context = vec![unit("Table: users", None)];
        let prompt = build_prompt(&context, "what tables exist?");
        assert!(prompt.contains("Table: users"));
        assert!(prompt.contains("what tables exist?"));
    }

    #[test]
    fn test_create_generator_disabled() {
        let config = GenerationConfig::default();
        assert!(create_generator(&config).unwrap().is_none());
    }
}
