//! Two-phase incident evaluation.
//!
//! Phase 1 grades title and description and must succeed. Phase 2 grades
//! the conclusion against the phase-1 result; it only runs when the
//! incident has conclusion text, and any failure there is logged and
//! leaves the conclusion assessment empty.

use std::sync::Arc;

use async_trait::async_trait;
use minijinja::{context, Environment};
use relay_core::traits::Evaluator;
use relay_core::{ConclusionAssessment, DescriptionAssessment, Evaluation, Incident, SyncError};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::EvaluationError;
use crate::json::extract_json;
use crate::prompts::{user_templates, PromptSet, PHASE1, PHASE2};
use crate::provider::{LlmProvider, Message};

const TEMPERATURE: f32 = 0.1;
const MAX_TOKENS: u32 = 512;

pub struct TwoPhaseEvaluator {
    provider: Arc<dyn LlmProvider>,
    prompts: PromptSet,
    templates: Environment<'static>,
    temperature: f32,
    max_tokens: u32,
}

impl TwoPhaseEvaluator {
    pub fn new(provider: Arc<dyn LlmProvider>, prompts: PromptSet) -> Result<Self, EvaluationError> {
        let templates = user_templates().map_err(|source| EvaluationError::Template {
            phase: "setup",
            source,
        })?;
        Ok(Self {
            provider,
            prompts,
            templates,
            temperature: TEMPERATURE,
            max_tokens: MAX_TOKENS,
        })
    }

    fn render(&self, phase: &'static str, ctx: minijinja::Value) -> Result<String, EvaluationError> {
        self.templates
            .get_template(phase)
            .and_then(|t| t.render(ctx))
            .map_err(|source| EvaluationError::Template { phase, source })
    }

    async fn ask<T: DeserializeOwned>(
        &self,
        phase: &'static str,
        system: &str,
        user: String,
    ) -> Result<T, EvaluationError> {
        let answer = self
            .provider
            .complete(
                vec![Message::system(system), Message::user(user)],
                self.temperature,
                self.max_tokens,
            )
            .await
            .map_err(|source| EvaluationError::Llm { phase, source })?;

        serde_json::from_str(extract_json(&answer)).map_err(|e| EvaluationError::InvalidAnswer {
            phase,
            detail: e.to_string(),
            answer,
        })
    }

    pub async fn assess_description(
        &self,
        incident: &Incident,
    ) -> Result<DescriptionAssessment, EvaluationError> {
        let user = self.render(PHASE1, context! { incident => incident })?;
        let mut assessment: DescriptionAssessment =
            self.ask(PHASE1, &self.prompts.phase1, user).await?;
        assessment.score = assessment.score.min(100);
        Ok(assessment)
    }

    pub async fn assess_conclusion(
        &self,
        incident: &Incident,
        description: &DescriptionAssessment,
    ) -> Result<ConclusionAssessment, EvaluationError> {
        let phase1 = serde_json::to_string(description).map_err(|e| EvaluationError::InvalidAnswer {
            phase: PHASE1,
            detail: e.to_string(),
            answer: String::new(),
        })?;
        let user = self.render(PHASE2, context! { incident => incident, phase1 => phase1 })?;
        let mut assessment: ConclusionAssessment =
            self.ask(PHASE2, &self.prompts.phase2, user).await?;
        assessment.score = assessment.score.min(100);
        Ok(assessment)
    }

    pub async fn run(&self, incident: &Incident) -> Result<Evaluation, EvaluationError> {
        let description = self.assess_description(incident).await?;
        debug!(incident = %incident.key, score = description.score, "description assessed");

        let conclusion = if incident.has_conclusion() {
            match self.assess_conclusion(incident, &description).await {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!(incident = %incident.key, error = %e, "conclusion assessment failed");
                    None
                }
            }
        } else {
            None
        };

        Ok(Evaluation {
            description,
            conclusion,
        })
    }
}

#[async_trait]
impl Evaluator for TwoPhaseEvaluator {
    async fn evaluate(&self, incident: &Incident) -> Result<Evaluation, SyncError> {
        debug!(incident = %incident.key, model = self.provider.model(), "evaluating incident");
        Ok(self.run(incident).await?)
    }
}
