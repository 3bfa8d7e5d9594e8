use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use stavily_core::PollResponse;

use crate::error::{ClientError, ClientResult};
use crate::rate_limit::RateLimiter;
use crate::retry::RetryPolicy;
use crate::token::TokenSource;
use crate::types::{
    AgentRegistration, AgentRegistrationResponse, HeartbeatRequest, HeartbeatState, InstructionStatus,
    PollResponseWire, SubmitResultRequest, SubmitResultResponse, UpdateInstructionRequest, UpdateInstructionResponse,
};

const DEFAULT_DEADLINE: Duration = Duration::from_secs(30);

/// Configuration needed to build an [`OrchestratorClient`].
pub struct ClientConfig {
    pub base_url: String,
    pub agent_id: String,
    pub token_path: PathBuf,
    pub token_override: Option<String>,
    pub retry: RetryPolicy,
    pub rate_limit_burst: u32,
    pub rate_limit_per_second: f64,
}

/// Stateless request/response client for the orchestrator's four core
/// operations plus registration (§4.2, §6). Safe to share across tasks via
/// `Arc`; holds no mutable agent state of its own beyond the token cache
/// and rate-limiter bucket.
pub struct OrchestratorClient {
    http: reqwest::Client,
    base_url: String,
    agent_id: String,
    token: TokenSource,
    retry: RetryPolicy,
    rate_limiter: RateLimiter,
}

impl OrchestratorClient {
    /// # Errors
    ///
    /// Returns an error if the underlying `reqwest::Client` cannot be
    /// constructed (e.g. TLS backend initialization failure).
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("stavily-agent/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ClientError::Transport {
                op: "build_client",
                message: e.to_string(),
            })?;
        Ok(Self {
            http,
            base_url: config.base_url,
            agent_id: config.agent_id,
            token: TokenSource::new(config.token_path, config.token_override),
            retry: config.retry,
            rate_limiter: RateLimiter::new(config.rate_limit_burst, config.rate_limit_per_second),
        })
    }

    /// `POST /api/v1/agents`. A `400` response whose body mentions
    /// "already exists" is treated as success (§6).
    pub async fn register(&self, registration: &AgentRegistration<'_>) -> ClientResult<AgentRegistrationResponse> {
        let path = "/api/v1/agents".to_string();
        self.retry
            .run("register", || async {
                let resp = self.send(Method::POST, &path, Some(registration), "register").await;
                match resp {
                    Err(ClientError::Orchestrator { status, body, .. })
                        if status == 400 && body.to_lowercase().contains("already exists") =>
                    {
                        Ok(AgentRegistrationResponse {
                            agent_id: self.agent_id.clone(),
                            api_key: None,
                        })
                    },
                    other => other,
                }
            })
            .await
    }

    /// `POST /api/v1/agents/{id}/heartbeat`. Synchronously reports
    /// transport failure; callers treat failure as non-fatal (§4.7).
    pub async fn heartbeat(&self, state: HeartbeatState) -> ClientResult<()> {
        let path = format!("/api/v1/agents/{}/heartbeat", self.agent_id);
        let body = HeartbeatRequest {
            state,
            timestamp: chrono::Utc::now(),
        };
        self.retry
            .run("heartbeat", || self.send_unit(Method::POST, &path, Some(&body), "heartbeat"))
            .await
    }

    /// The bearer token file's current mtime, for callers that want to
    /// detect rotation without forcing a request (§4.2). See
    /// [`TokenSource::file_mtime`].
    #[must_use]
    pub fn token_file_mtime(&self) -> Option<std::time::SystemTime> {
        self.token.file_mtime()
    }

    /// `GET /api/v1/agents/{id}/poll`. Never retried within one tick — a
    /// failure here is surfaced immediately and the next tick simply tries
    /// again (§4.2).
    pub async fn poll(&self) -> ClientResult<PollResponse> {
        let path = format!("/api/v1/agents/{}/poll", self.agent_id);
        let wire: PollResponseWire = self.send::<(), _>(Method::GET, &path, None, "poll").await?;
        Ok(PollResponse {
            instruction: wire.instruction,
            status: wire.status,
            next_poll_interval: wire.next_poll_interval,
        })
    }

    /// `PATCH /api/v1/agents/{id}/instructions/{iid}`.
    pub async fn update_instruction(
        &self,
        instruction_id: &str,
        status: InstructionStatus,
        execution_log: &[String],
    ) -> ClientResult<UpdateInstructionResponse> {
        let path = format!("/api/v1/agents/{}/instructions/{instruction_id}", self.agent_id);
        let body = UpdateInstructionRequest { status, execution_log };
        self.retry
            .run("update_instruction", || async {
                self.send(Method::PATCH, &path, Some(&body), "update_instruction").await
            })
            .await
    }

    /// `POST /api/v1/agents/{id}/instructions/{iid}/result`. Retries MUST
    /// be idempotent on `instructionId`; the orchestrator is expected to
    /// deduplicate (§4.2).
    #[allow(clippy::too_many_arguments)]
    pub async fn submit_instruction_result(
        &self,
        instruction_id: &str,
        status: InstructionStatus,
        result: Option<&Value>,
        error_message: Option<&str>,
        error_details: Option<&Value>,
        execution_log: &[String],
    ) -> ClientResult<SubmitResultResponse> {
        let path = format!("/api/v1/agents/{}/instructions/{instruction_id}/result", self.agent_id);
        let body = SubmitResultRequest {
            status,
            result,
            error_message,
            error_details,
            execution_log,
        };
        self.retry
            .run("submit_instruction_result", || async {
                self.send(Method::POST, &path, Some(&body), "submit_instruction_result").await
            })
            .await
    }

    /// Like [`OrchestratorClient::send`], but for endpoints (heartbeat
    /// acks) that return `200`/`204` with no body worth decoding.
    async fn send_unit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        op: &'static str,
    ) -> ClientResult<()> {
        if !self.rate_limiter.acquire(DEFAULT_DEADLINE).await {
            return Err(ClientError::RateLimited(op));
        }
        match self.send_once_unit(method.clone(), path, body, op).await {
            Err(ClientError::Auth(_)) => {
                self.token.invalidate().await;
                self.send_once_unit(method, path, body, op).await
            },
            other => other,
        }
    }

    async fn send_once_unit<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        op: &'static str,
    ) -> ClientResult<()> {
        let token = self.token.current().await.map_err(|e| ClientError::Auth(e.to_string()))?;
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));
        let mut req = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req.send().await.map_err(|e| ClientError::Transport {
            op,
            message: e.to_string(),
        })?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Auth(format!("401 from {op}")));
        }
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Orchestrator {
                op,
                status: status.as_u16(),
                body: body_text,
            });
        }
        Ok(())
    }

    /// Send one request, handling rate limiting and the single
    /// reload-and-retry-once 401 recovery path (§4.2).
    async fn send<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        op: &'static str,
    ) -> ClientResult<R> {
        if !self.rate_limiter.acquire(DEFAULT_DEADLINE).await {
            return Err(ClientError::RateLimited(op));
        }

        let response = self.send_once(method.clone(), path, body, op).await;

        match response {
            Err(ClientError::Auth(_)) => {
                self.token.invalidate().await;
                self.send_once(method, path, body, op).await
            },
            other => other,
        }
    }

    async fn send_once<B: Serialize + ?Sized, R: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        op: &'static str,
    ) -> ClientResult<R> {
        let token = self.token.current().await.map_err(|e| ClientError::Auth(e.to_string()))?;
        let url = format!("{}{path}", self.base_url.trim_end_matches('/'));

        let mut req = self
            .http
            .request(method, &url)
            .bearer_auth(token)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            req = req.json(body);
        }

        tracing::debug!(op, url, "sending orchestrator request");

        let resp = req.send().await.map_err(|e| ClientError::Transport {
            op,
            message: e.to_string(),
        })?;

        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(ClientError::Auth(format!("401 from {op}")));
        }
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(ClientError::Orchestrator {
                op,
                status: status.as_u16(),
                body: body_text,
            });
        }

        resp.json::<R>().await.map_err(|e| ClientError::Transport {
            op,
            message: format!("failed to decode response: {e}"),
        })
    }
}
