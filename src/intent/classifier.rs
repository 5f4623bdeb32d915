//! The layered intent classifier.

use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::{base::config::Config, service::llm::LlmClient};

use super::{ClassifiedIntent, IntentCategory, alias::AliasTable, command::Command, named_query, rules};

/// Resolves message text to a [`ClassifiedIntent`].
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct IntentClassifier {
    aliases: AliasTable,
    llm: Option<LlmClient>,
    ai_threshold: f64,
    ai_timeout: Duration,
}

impl IntentClassifier {
    pub fn new(config: &Config, llm: Option<LlmClient>) -> Self {
        Self {
            aliases: AliasTable::load(config.alias_file.as_deref()),
            llm,
            ai_threshold: config.ai_confidence_threshold,
            ai_timeout: config.openai_timeout,
        }
    }

    /// Replaces the alias table.
    pub fn with_aliases(mut self, aliases: AliasTable) -> Self {
        self.aliases = aliases;
        self
    }

    /// Runs the deterministic tiers: alias, named query, command and rules.
    pub fn classify_deterministic(&self, text: &str) -> ClassifiedIntent {
        if let Some(intent) = self.aliases.classify(text) {
            return intent;
        }

        if let Some(intent) = named_query::classify(text) {
            return intent;
        }

        if let Some(intent) = Command::classify(text) {
            return intent;
        }

        rules::evaluate(text)
    }

    /// Classifies a message, consulting the AI tier when the rules are inconclusive.
    #[instrument(skip_all)]
    pub async fn classify(&self, text: &str) -> ClassifiedIntent {
        let intent = self.classify_deterministic(text);

        if !self.is_inconclusive(&intent) {
            debug!("Classified by {} as {:?} ({:.2}).", intent.source.label(), intent.category, intent.confidence);
            return intent;
        }

        let Some(llm) = &self.llm else {
            return intent;
        };

        match timeout(self.ai_timeout, llm.classify_intent(text)).await {
            Ok(Ok(classification)) => {
                if classification.confidence >= self.ai_threshold && classification.confidence > intent.confidence {
                    debug!("AI classification accepted: {:?} ({:.2}).", classification.intent, classification.confidence);
                    return ClassifiedIntent::from_ai(classification, text);
                }

                debug!("AI classification ignored: {:?} ({:.2}).", classification.intent, classification.confidence);
                intent
            }
            Ok(Err(err)) => {
                warn!("AI classification failed, using the rule result: {err}");
                intent
            }
            Err(_) => {
                warn!("AI classification timed out after {:?}, using the rule result.", self.ai_timeout);
                intent
            }
        }
    }

    /// Whether a deterministic result leaves room for the AI tier.
    fn is_inconclusive(&self, intent: &ClassifiedIntent) -> bool {
        if !intent.source.is_inferred() {
            return false;
        }

        intent.category == IntentCategory::Unclear || intent.confidence <= self.ai_threshold
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use mockall::mock;

    use super::*;
    use crate::{
        base::{
            config::ConfigInner,
            types::{AiClassification, AiIntent, Res},
        },
        intent::IntentSource,
        service::llm::GenericLlmClient,
    };

    mock! {
        pub Llm {}

        #[async_trait]
        impl GenericLlmClient for Llm {
            async fn classify_intent(&self, message: &str) -> Res<AiClassification>;
        }
    }

    /// Never answers.
    struct SlowLlm;

    #[async_trait]
    impl GenericLlmClient for SlowLlm {
        async fn classify_intent(&self, _message: &str) -> Res<AiClassification> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Err(anyhow::anyhow!("unreachable"))
        }
    }

    fn classifier(llm: Option<LlmClient>) -> IntentClassifier {
        let config = Config::from(ConfigInner {
            openai_timeout: Duration::from_millis(50),
            ..Default::default()
        });

        IntentClassifier::new(&config, llm)
    }

    fn answering(intent: AiIntent, confidence: f64) -> LlmClient {
        let mut mock = MockLlm::new();
        mock.expect_classify_intent().returning(move |_| {
            Ok(AiClassification {
                intent,
                confidence,
                reasoning: "model says so".to_string(),
                person_name: None,
            })
        });

        LlmClient::new(Arc::new(mock))
    }

    #[tokio::test]
    async fn test_tier_priority() {
        let classifier = classifier(None);

        assert_eq!(classifier.classify("WFH").await.source, IntentSource::Alias);
        assert_eq!(classifier.classify("where is John today?").await.category, IntentCategory::PersonQuery);
        assert_eq!(classifier.classify("help").await.category, IntentCategory::Command(Command::Help));
        assert_eq!(classifier.classify("I'm working from home").await.source, IntentSource::Rule);
    }

    #[tokio::test]
    async fn test_ai_failure_falls_back_to_rules() {
        let mut mock = MockLlm::new();
        mock.expect_classify_intent().returning(|_| Err(anyhow::anyhow!("boom")));
        let classifier = classifier(Some(LlmClient::new(Arc::new(mock))));

        let intent = classifier.classify("I'm working from home").await;
        assert_eq!(intent.category, IntentCategory::SetRemote);
        assert_eq!(intent.source, IntentSource::Rule);

        let intent = classifier.classify("something odd").await;
        assert_eq!(intent.category, IntentCategory::Unclear);
        assert_eq!(intent.source, IntentSource::Rule);
    }

    #[tokio::test]
    async fn test_ai_timeout_falls_back_to_rules() {
        let classifier = classifier(Some(LlmClient::new(Arc::new(SlowLlm))));

        let intent = classifier.classify("home today").await;

        assert_eq!(intent.category, IntentCategory::SetRemote);
        assert_eq!(intent.confidence, 0.4);
        assert_eq!(intent.source, IntentSource::Rule);
    }

    #[tokio::test]
    async fn test_ai_only_consulted_when_inconclusive() {
        let mut mock = MockLlm::new();
        mock.expect_classify_intent().never();
        let classifier = classifier(Some(LlmClient::new(Arc::new(mock))));

        let intent = classifier.classify("In the office today").await;

        assert_eq!(intent.category, IntentCategory::SetOffice);
    }

    #[tokio::test]
    async fn test_ai_result_accepted_above_threshold() {
        let classifier = classifier(Some(answering(AiIntent::SetOffice, 0.85)));

        let intent = classifier.classify("gonna be at my desk downtown").await;

        assert_eq!(intent.category, IntentCategory::SetOffice);
        assert_eq!(intent.source, IntentSource::Ai);
        assert_eq!(intent.confidence, 0.85);
    }

    #[tokio::test]
    async fn test_ai_result_below_threshold_is_ignored() {
        let classifier = classifier(Some(answering(AiIntent::SetOffice, 0.3)));

        let intent = classifier.classify("gonna be at my desk downtown").await;

        assert_eq!(intent.category, IntentCategory::Unclear);
        assert_eq!(intent.source, IntentSource::Rule);
    }

    #[tokio::test]
    async fn test_ai_tie_prefers_rule() {
        let classifier = classifier(Some(answering(AiIntent::SetOffice, 0.4)));

        let intent = classifier.classify("home today").await;

        assert_eq!(intent.category, IntentCategory::SetRemote);
        assert_eq!(intent.source, IntentSource::Rule);
    }
}
