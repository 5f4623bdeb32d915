//! OpenAI implementation of the intent classifier backend.
//!
//! A single Responses API call per message, constrained to a strict JSON schema.
//! There are no retries: the caller bounds the call with its own timeout and falls
//! back to the rule result on any failure.

use std::sync::{Arc, OnceLock};

use async_openai::{
    Client,
    config::OpenAIConfig,
    types::responses::{Content, CreateResponseArgs, Input, InputItem, InputMessageArgs, OutputContent, Response, ResponseFormatJsonSchema, Role, TextConfig, TextResponseFormat},
};
use async_trait::async_trait;
use tracing::{debug, instrument, warn};

use crate::base::{
    config::Config,
    types::{AiClassification, Res},
};

use super::{GenericLlmClient, LlmClient};

/// Classifier answers are a handful of fields.
const MAX_OUTPUT_TOKENS: u32 = 200;

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    /// Creates an OpenAI backed client, if an API key is configured.
    pub fn openai(config: &Config) -> Option<Self> {
        if !config.ai_enabled() {
            return None;
        }

        let client = OpenAiLlmClient::new(config);
        Some(Self { inner: Arc::new(client) })
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Client<OpenAIConfig>,
    config: Config,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let cfg = OpenAIConfig::new().with_api_key(config.openai_api_key.clone().unwrap_or_default());

        Self {
            client: Client::with_config(cfg),
            config: config.clone(),
        }
    }

    /// Build the classifier input.
    fn build_classifier_input(&self, message: &str) -> Res<Input> {
        Ok(Input::Items(vec![InputItem::Message(
            InputMessageArgs::default().role(Role::User).content(format!("# Message\n\n{message}\n\n")).build()?,
        )]))
    }
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(name = "OpenAiLlmClient::classify_intent", skip_all)]
    async fn classify_intent(&self, message: &str) -> Res<AiClassification> {
        let input = self.build_classifier_input(message)?;

        let mut request = CreateResponseArgs::default();
        request
            .instructions(self.config.classifier_system_directive.clone())
            .max_output_tokens(MAX_OUTPUT_TOKENS)
            .model(&self.config.openai_model)
            .text(get_openai_text_config().clone())
            .input(input);

        // Add the temperature for the non-reasoning models.
        if self.config.openai_model.starts_with("gpt") {
            request.temperature(self.config.openai_temperature);
        }

        let response = self.client.responses().create(request.build()?).await?;
        let text = extract_output_text(&response)?;

        debug!("Classifier output: {text}");

        parse_classification(&text)
    }
}

/// Collects the output text of a response.
fn extract_output_text(response: &Response) -> Res<String> {
    let mut result = String::new();

    for output in &response.output {
        match output {
            OutputContent::Message(message) => {
                for content in &message.content {
                    match content {
                        Content::OutputText(text) => result.push_str(&text.text),
                        Content::Refusal(reason) => {
                            return Err(anyhow::anyhow!("Request refused: {reason:#?}"));
                        }
                    }
                }
            }
            _ => {
                warn!("Unexpected classifier output: {output:#?}");
            }
        }
    }

    if result.trim().is_empty() {
        return Err(anyhow::anyhow!("Classifier returned no text."));
    }

    Ok(result)
}

/// Parses and validates the classifier JSON.
pub fn parse_classification(text: &str) -> Res<AiClassification> {
    let classification: AiClassification = serde_json::from_str(text.trim())?;

    if !(0.0..=1.0).contains(&classification.confidence) || classification.confidence.is_nan() {
        return Err(anyhow::anyhow!("Classifier confidence out of range: {}", classification.confidence));
    }

    Ok(classification)
}

// Statics.

static OPENAI_TEXT_CONFIG: OnceLock<TextConfig> = OnceLock::new();

fn get_openai_text_config() -> &'static TextConfig {
    OPENAI_TEXT_CONFIG.get_or_init(|| TextConfig {
        format: TextResponseFormat::JsonSchema(ResponseFormatJsonSchema {
            name: "CheckinIntent".to_string(),
            description: Some("Classification of a check-in chat message.".to_string()),
            schema: Some(serde_json::json!({
                "type": "object",
                "properties": {
                    "intent": {
                        "type": "string",
                        "enum": ["set_office", "set_remote", "not_working", "status_query", "holiday_query", "team_query", "person_query", "unclear"]
                    },
                    "confidence": { "type": "number" },
                    "reasoning": { "type": "string" },
                    "person_name": { "type": ["string", "null"] }
                },
                "required": ["intent", "confidence", "reasoning", "person_name"],
                "additionalProperties": false
            })),
            strict: Some(true),
        }),
    })
}

// Tests.
