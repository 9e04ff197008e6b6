//! Analysts backed by an LLM provider

use async_trait::async_trait;
use council_core::{
    Producer, ProducerError, ProposalTask, RawOutput, RevisionTask, Role,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::decode::decode_payload;
use crate::prompts::{PromptBook, system_prompt};
use crate::{CompletionRequest, LLMProvider, Message, StopReason};

/// Default model when none is configured
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Completion settings shared by every analyst
#[derive(Debug, Clone, PartialEq)]
pub struct ProducerSettings {
    /// Model identifier
    pub model: String,
    /// Maximum tokens per completion
    pub max_tokens: usize,
    /// Sampling temperature
    pub temperature: Option<f32>,
    /// Ask the provider for JSON-object output
    pub json_output: bool,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 800,
            temperature: Some(0.2),
            json_output: true,
        }
    }
}

impl ProducerSettings {
    /// Settings from `OPENAI_MODEL`, falling back to defaults
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            if !model.trim().is_empty() {
                settings.model = model.trim().to_string();
            }
        }
        settings
    }

    pub(crate) fn request(&self, system: &str, messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest {
            model: self.model.clone(),
            messages,
            system: Some(system.to_string()),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            json_output: self.json_output,
        }
    }
}

/// A role-specific analyst that asks an LLM for its proposals
pub struct LlmProducer {
    role: Role,
    provider: Arc<dyn LLMProvider>,
    prompts: Arc<PromptBook>,
    settings: ProducerSettings,
}

impl LlmProducer {
    /// Create an analyst for a role
    pub fn new(
        role: Role,
        provider: Arc<dyn LLMProvider>,
        prompts: Arc<PromptBook>,
        settings: ProducerSettings,
    ) -> Self {
        Self {
            role,
            provider,
            prompts,
            settings,
        }
    }

    /// One analyst per role, sharing a provider and prompt book
    pub fn for_roles(
        roles: &[Role],
        provider: &Arc<dyn LLMProvider>,
        prompts: &Arc<PromptBook>,
        settings: &ProducerSettings,
    ) -> Vec<Arc<dyn Producer>> {
        roles
            .iter()
            .map(|role| {
                Arc::new(Self::new(
                    *role,
                    provider.clone(),
                    prompts.clone(),
                    settings.clone(),
                )) as Arc<dyn Producer>
            })
            .collect()
    }

    async fn ask(&self, messages: Vec<Message>) -> Result<RawOutput, ProducerError> {
        let request = self.settings.request(system_prompt(self.role), messages);
        let response = self.provider.complete(request).await?;
        match response.stop_reason {
            StopReason::ContentFilter => {
                return Err(ProducerError::Failed(
                    "completion withheld by content filter".to_string(),
                ));
            }
            StopReason::MaxTokens => {
                warn!("{} hit the {}-token limit", self.role, self.settings.max_tokens);
            }
            StopReason::EndTurn => {}
        }

        let text = response.message.text().trim();
        if text.is_empty() {
            return Err(ProducerError::Malformed("empty completion".to_string()));
        }

        debug!(
            "{} answered with {} chars ({} tokens)",
            self.role,
            text.len(),
            response.usage.total()
        );
        Ok(RawOutput::structured(decode_payload(text)).with_text(text))
    }
}

#[async_trait]
impl Producer for LlmProducer {
    fn role(&self) -> Role {
        self.role
    }

    #[instrument(skip(self, task), fields(role = %self.role, provider = self.provider.name()))]
    async fn propose(&self, task: &ProposalTask) -> Result<RawOutput, ProducerError> {
        let prompt = self.prompts.proposal_prompt(task)?;
        self.ask(vec![Message::user(prompt)]).await
    }

    #[instrument(skip(self, task), fields(role = %self.role, round = task.round))]
    async fn revise(&self, task: &RevisionTask) -> Result<RawOutput, ProducerError> {
        let opening = ProposalTask {
            request: task.request.clone(),
            role: task.role,
            hint: None,
        };
        let request_block = self.prompts.proposal_prompt(&opening)?;
        let instruction = self.prompts.revision_prompt(task)?;
        let prior = task
            .prior
            .raw_response()
            .unwrap_or_else(|| task.prior.thesis())
            .to_string();

        self.ask(vec![
            Message::user(request_block),
            Message::assistant(prior),
            Message::user(instruction),
        ])
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ChatRole, CompletionResponse, LLMError};
    use council_core::{Action, Horizon, PeerPosition, Proposal, Request};
    use council_engine::ProposalValidator;
    use mockall::mock;

    mock! {
        pub Provider {}

        #[async_trait]
        impl LLMProvider for Provider {
            async fn complete(&self, request: CompletionRequest) -> crate::Result<CompletionResponse>;
            fn name(&self) -> &str;
        }
    }

    fn producer(provider: MockProvider, role: Role) -> LlmProducer {
        LlmProducer::new(
            role,
            Arc::new(provider),
            Arc::new(PromptBook::new().unwrap()),
            ProducerSettings::default(),
        )
    }

    fn task(role: Role) -> ProposalTask {
        ProposalTask {
            request: Request::new("AAPL", Horizon::Short).unwrap(),
            role,
            hint: None,
        }
    }

    #[tokio::test]
    async fn test_propose_decodes_fenced_json() {
        let mut provider = MockProvider::new();
        provider.expect_name().return_const("mock".to_string());
        provider
            .expect_complete()
            .withf(|request: &CompletionRequest| {
                request.system.as_deref() == Some(system_prompt(Role::Technical))
                    && request.messages.len() == 1
                    && request.json_output
            })
            .times(1)
            .returning(|_| {
                Ok(CompletionResponse::text(
                    "```json\n{\"action\": \"BUY\", \"conviction\": 0.8, \"thesis\": \"Breakout\"}\n```",
                ))
            });

        let output = producer(provider, Role::Technical)
            .propose(&task(Role::Technical))
            .await
            .unwrap();

        assert_eq!(output.payload["action"], "BUY");
        assert!(output.text.unwrap().starts_with("```json"));
    }

    #[tokio::test]
    async fn test_provider_error_becomes_failure() {
        let mut provider = MockProvider::new();
        provider.expect_name().return_const("mock".to_string());
        provider
            .expect_complete()
            .returning(|_| Err(LLMError::AuthenticationFailed));

        let err = producer(provider, Role::News)
            .propose(&task(Role::News))
            .await
            .unwrap_err();
        assert!(matches!(err, ProducerError::Failed(_)));
    }

    #[tokio::test]
    async fn test_filtered_completion_is_a_failure() {
        let mut provider = MockProvider::new();
        provider.expect_name().return_const("mock".to_string());
        provider.expect_complete().returning(|_| {
            Ok(CompletionResponse::text("").with_stop_reason(StopReason::ContentFilter))
        });

        let err = producer(provider, Role::News)
            .propose(&task(Role::News))
            .await
            .unwrap_err();
        assert!(matches!(err, ProducerError::Failed(msg) if msg.contains("content filter")));
    }

    #[tokio::test]
    async fn test_truncated_completion_is_still_decoded() {
        let mut provider = MockProvider::new();
        provider.expect_name().return_const("mock".to_string());
        provider.expect_complete().returning(|_| {
            Ok(CompletionResponse::text(r#"{"action": "SELL", "conviction": 0.5"#)
                .with_stop_reason(StopReason::MaxTokens))
        });

        let output = producer(provider, Role::News)
            .propose(&task(Role::News))
            .await
            .unwrap();
        assert!(output.payload.is_string());
    }

    #[tokio::test]
    async fn test_empty_completion_is_malformed() {
        let mut provider = MockProvider::new();
        provider.expect_name().return_const("mock".to_string());
        provider
            .expect_complete()
            .returning(|_| Ok(CompletionResponse::text("   ")));

        let err = producer(provider, Role::News)
            .propose(&task(Role::News))
            .await
            .unwrap_err();
        assert!(matches!(err, ProducerError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_revise_replays_prior_answer() {
        let mut provider = MockProvider::new();
        provider
            .expect_complete()
            .withf(|request: &CompletionRequest| {
                let roles: Vec<ChatRole> = request.messages.iter().map(|m| m.role).collect();
                roles == [ChatRole::User, ChatRole::Assistant, ChatRole::User]
                    && request.messages[1].content == r#"{"action":"SELL"}"#
                    && request.messages[2].content.contains("OPPOSING POSITIONS")
            })
            .times(1)
            .returning(|_| {
                Ok(CompletionResponse::text(
                    r#"{"action": "HOLD", "conviction": 0.6, "thesis": "Priced in"}"#,
                ))
            });

        let prior = Proposal::new(Role::Fundamental, Action::Sell, 0.75, "Overvalued")
            .with_raw_response(r#"{"action":"SELL"}"#);
        let peer = Proposal::new(Role::Technical, Action::Buy, 0.75, "Breakout");
        let revision = RevisionTask {
            request: Request::new("AAPL", Horizon::Short).unwrap(),
            role: Role::Fundamental,
            round: 1,
            prior,
            peers: vec![PeerPosition::from(&peer)],
        };

        let output = producer(provider, Role::Fundamental)
            .revise(&revision)
            .await
            .unwrap();
        let proposal = ProposalValidator::default().validate(Role::Fundamental, &output);
        assert_eq!(proposal.action(), Action::Hold);
        assert_eq!(proposal.conviction(), 0.6);
    }
}
