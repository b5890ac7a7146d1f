//! HTTP client for the external policy engine. One request per evaluation;
//! the service layer wraps calls through this client in the resilience
//! stack (breaker, retry, timeout).

use std::time::Duration;

use aegis_domain::entities::{Decision, Principal, Target};
use serde::Serialize;

use crate::error::AuthzError;

#[derive(Debug, Serialize)]
struct EvaluateRequest<'a> {
    principal: &'a Principal,
    target: &'a Target,
    action: &'a str,
}

#[derive(Debug, Serialize)]
struct A2aEvaluateRequest<'a> {
    source_agent: &'a str,
    target_agent: &'a str,
    capability: &'a str,
    parameters: &'a serde_json::Value,
}

#[derive(Clone)]
pub struct PolicyEngineClient {
    client: reqwest::Client,
    engine_url: String,
}

impl PolicyEngineClient {
    pub fn new(engine_url: impl Into<String>, connect_timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .unwrap_or_default();
        Self {
            client,
            engine_url: engine_url.into(),
        }
    }

    pub async fn evaluate(&self, principal: &Principal, target: &Target, action: &str) -> Result<Decision, AuthzError> {
        let body = EvaluateRequest { principal, target, action };
        self.post(&body).await
    }

    pub async fn evaluate_a2a(
        &self,
        source_agent: &str,
        target_agent: &str,
        capability: &str,
        parameters: &serde_json::Value,
    ) -> Result<Decision, AuthzError> {
        let body = A2aEvaluateRequest {
            source_agent,
            target_agent,
            capability,
            parameters,
        };
        self.post(&body).await
    }

    async fn post<B: Serialize + ?Sized>(&self, body: &B) -> Result<Decision, AuthzError> {
        let response = self
            .client
            .post(&self.engine_url)
            .json(body)
            .send()
            .await
            .map_err(AuthzError::from_reqwest)?;

        let status = response.status();
        if status.is_success() {
            response
                .json::<Decision>()
                .await
                .map_err(|e| AuthzError::Decode(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AuthzError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
