//! The remote `Planner` (spec.md §4.5/§6): takes the conversation so far and
//! returns a mix of text and structured tool calls.

use async_trait::async_trait;
use std::sync::Mutex;
use tracing::instrument;

use crate::error::{AgentError, AgentResult};
use crate::protocol::{PlannerRequest, PlannerResponse};

#[async_trait]
pub trait Planner: Send + Sync {
    async fn complete(&self, request: PlannerRequest) -> AgentResult<PlannerResponse>;
}

/// Talks to the Planner HTTP endpoint, mirroring the teacher's
/// `reqwest::Client::builder().user_agent(...).build()` client idiom
/// (`nix-env-manager::attic::AtticClient`).
pub struct HttpPlanner {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl HttpPlanner {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent("dt-agent/0.1.0")
            .build()
            .expect("failed to build planner HTTP client");
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl Planner for HttpPlanner {
    #[instrument(skip_all, fields(model = %request.model))]
    async fn complete(&self, request: PlannerRequest) -> AgentResult<PlannerResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            return Err(AgentError::RateLimited);
        }
        if !status.is_success() {
            return Err(AgentError::Planner(format!("planner returned {status}")));
        }

        Ok(response.json::<PlannerResponse>().await?)
    }
}

/// One scripted outcome for `FakePlanner::scripted`: either a response to
/// return, or a rate-limit/overload error to simulate.
#[derive(Clone)]
pub enum FakePlannerStep {
    Response(PlannerResponse),
    RateLimited,
}

/// Scripted planner for tests: returns a queued sequence of responses, one
/// per call, mirroring `oxidized_state::fakes::MemoryCasStore`'s
/// "pre-seeded, consumed in order" idiom.
pub struct FakePlanner {
    steps: Mutex<Vec<FakePlannerStep>>,
}

impl FakePlanner {
    pub fn new(responses: Vec<PlannerResponse>) -> Self {
        Self::scripted(responses.into_iter().map(FakePlannerStep::Response).collect())
    }

    pub fn scripted(steps: Vec<FakePlannerStep>) -> Self {
        Self { steps: Mutex::new(steps) }
    }
}

#[async_trait]
impl Planner for FakePlanner {
    async fn complete(&self, _request: PlannerRequest) -> AgentResult<PlannerResponse> {
        let mut steps = self.steps.lock().unwrap();
        if steps.is_empty() {
            return Err(AgentError::Planner("fake planner exhausted its script".to_string()));
        }
        match steps.remove(0) {
            FakePlannerStep::Response(response) => Ok(response),
            FakePlannerStep::RateLimited => Err(AgentError::RateLimited),
        }
    }
}
