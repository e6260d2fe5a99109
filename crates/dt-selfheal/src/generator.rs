//! The `Generator` seam (spec.md §1: external collaborator; spec.md §4.6
//! "Calls `Generator.regenerate(analysis, failureContext)`"). Mirrors the
//! `Planner` trait shape in `dt-agent::planner` ("scripted fake consumed in
//! order" for tests, real implementation is an HTTP collaborator owned
//! outside this crate).

use async_trait::async_trait;
use std::sync::Mutex;

use crate::classify::FailureClass;
use crate::error::{SelfHealError, SelfHealResult};

#[derive(Debug, Clone)]
pub struct FailureAnalysis {
    pub class: FailureClass,
    pub error: String,
}

/// What the `Generator` hands back: either a new spec body, or a decline
/// reason (spec.md §4.6 "otherwise records the reason and does nothing").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GeneratorOutput {
    pub code: Option<String>,
    pub reason: Option<String>,
}

impl GeneratorOutput {
    pub fn accepted(code: impl Into<String>) -> Self {
        Self { code: Some(code.into()), reason: None }
    }

    pub fn declined(reason: impl Into<String>) -> Self {
        Self { code: None, reason: Some(reason.into()) }
    }
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn regenerate(
        &self,
        analysis: &FailureAnalysis,
        context: &dt_types::FailureContext,
    ) -> SelfHealResult<GeneratorOutput>;
}

#[derive(serde::Serialize)]
struct GeneratorRequest<'a> {
    class: FailureClass,
    error: &'a str,
    context: &'a dt_types::FailureContext,
}

/// Talks to the Generator HTTP endpoint, mirroring `dt-agent::HttpPlanner`'s
/// `reqwest::Client` idiom.
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpGenerator {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("dt-selfheal/0.1.0")
            .build()
            .expect("failed to build generator HTTP client");
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Generator for HttpGenerator {
    async fn regenerate(
        &self,
        analysis: &FailureAnalysis,
        context: &dt_types::FailureContext,
    ) -> SelfHealResult<GeneratorOutput> {
        let request = GeneratorRequest {
            class: analysis.class,
            error: &analysis.error,
            context,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SelfHealError::Generator(format!(
                "generator returned {}",
                response.status()
            )));
        }

        Ok(response.json::<GeneratorOutput>().await?)
    }
}

/// Scripted generator for tests: one queued output per call.
pub struct FakeGenerator {
    outputs: Mutex<Vec<GeneratorOutput>>,
}

impl FakeGenerator {
    pub fn new(outputs: Vec<GeneratorOutput>) -> Self {
        Self { outputs: Mutex::new(outputs) }
    }
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn regenerate(
        &self,
        _analysis: &FailureAnalysis,
        _context: &dt_types::FailureContext,
    ) -> SelfHealResult<GeneratorOutput> {
        let mut outputs = self.outputs.lock().unwrap();
        if outputs.is_empty() {
            return Err(SelfHealError::Generator("fake generator exhausted its script".to_string()));
        }
        Ok(outputs.remove(0))
    }
}
