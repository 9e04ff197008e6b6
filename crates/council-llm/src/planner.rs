//! Planner that asks an LLM which analysts to consult

use async_trait::async_trait;
use council_core::{ProducerError, Request, Role, RoleMap};
use council_engine::{Plan, Planner};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::decode::decode_payload;
use crate::prompts::{PLANNER_SYSTEM_PROMPT, PromptBook};
use crate::{LLMProvider, Message, ProducerSettings};

/// LLM-backed [`Planner`]
pub struct LlmPlanner {
    provider: Arc<dyn LLMProvider>,
    prompts: Arc<PromptBook>,
    settings: ProducerSettings,
}

impl LlmPlanner {
    /// Create a planner
    pub fn new(
        provider: Arc<dyn LLMProvider>,
        prompts: Arc<PromptBook>,
        settings: ProducerSettings,
    ) -> Self {
        Self {
            provider,
            prompts,
            settings,
        }
    }

    fn parse(payload: &Value) -> Result<Plan, ProducerError> {
        let object = payload
            .as_object()
            .ok_or_else(|| ProducerError::Malformed("planner did not return an object".into()))?;

        let mut roles = Vec::new();
        for name in object
            .get("roles")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
        {
            match name.parse::<Role>() {
                Ok(role) if !roles.contains(&role) => roles.push(role),
                Ok(_) => {}
                Err(_) => warn!("Planner selected unknown role '{name}'"),
            }
        }

        let hints: RoleMap<String> = object
            .get("tasks")
            .and_then(Value::as_object)
            .into_iter()
            .flatten()
            .filter_map(|(name, hint)| {
                let role = name.parse::<Role>().ok()?;
                Some((role, hint.as_str()?.to_string()))
            })
            .collect();

        let reasoning = object
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Ok(Plan {
            roles,
            hints,
            reasoning,
        })
    }
}

#[async_trait]
impl Planner for LlmPlanner {
    #[instrument(skip_all, fields(subject = request.subject()))]
    async fn plan(&self, request: &Request, available: &[Role]) -> Result<Plan, ProducerError> {
        let prompt = self.prompts.planner_prompt(request, available)?;
        let completion = self
            .settings
            .request(PLANNER_SYSTEM_PROMPT, vec![Message::user(prompt)]);

        let response = self.provider.complete(completion).await?;
        let plan = Self::parse(&decode_payload(response.message.text()))?;
        debug!("Planner selected {:?}: {}", plan.roles, plan.reasoning);
        Ok(plan)
    }
}
