//! A [`wiremock`]-backed stand-in for the orchestrator's HTTP surface
//! (§6), so that workflow/dispatcher tests can mount exactly the
//! endpoints they exercise without re-deriving the path shape
//! (`/api/v1/agents/{id}/...`) in every test file.

use std::time::Duration;

use serde_json::json;
use stavily_core::Instruction;
use stavily_orchestrator_client::{ClientConfig, RetryPolicy};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// A running mock orchestrator plus the agent id every mounted route is
/// keyed on.
pub struct MockOrchestrator {
    pub server: MockServer,
    pub agent_id: String,
}

impl MockOrchestrator {
    /// Start a fresh mock server for `agent_id`.
    pub async fn start(agent_id: impl Into<String>) -> Self {
        Self {
            server: MockServer::start().await,
            agent_id: agent_id.into(),
        }
    }

    /// A [`ClientConfig`] pointed at this server, with a fixed bearer
    /// token (no token file reload needed) and fast retry/rate-limit
    /// settings suited to tests.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            base_url: self.server.uri(),
            agent_id: self.agent_id.clone(),
            token_path: "/dev/null".into(),
            token_override: Some("test-token".to_string()),
            retry: RetryPolicy::new(2, Duration::from_millis(5)),
            rate_limit_burst: 100,
            rate_limit_per_second: 1000.0,
        }
    }

    /// Accept any number of `POST .../heartbeat` requests with `204`.
    pub async fn mount_heartbeat_ok(&self) {
        Mock::given(method("POST"))
            .and(path(format!("/api/v1/agents/{}/heartbeat", self.agent_id)))
            .respond_with(ResponseTemplate::new(204))
            .mount(&self.server)
            .await;
    }

    /// Answer every poll with an empty response (no instruction), plus
    /// the given `next_poll_interval` hint.
    pub async fn mount_poll_empty(&self, next_poll_interval: Option<u64>) {
        self.mount_poll_empty_times(next_poll_interval, None).await;
    }

    /// Like [`Self::mount_poll_empty`], but answers only the next `times`
    /// polls — useful for layering a one-shot hint response ahead of a
    /// longer-lived fallback mount on the same route.
    pub async fn mount_poll_empty_times(&self, next_poll_interval: Option<u64>, times: Option<u64>) {
        let mut body = json!({ "status": "ok" });
        if let Some(secs) = next_poll_interval {
            body["nextPollInterval"] = json!(secs);
        }
        let mut mock = Mock::given(method("GET"))
            .and(path(format!("/api/v1/agents/{}/poll", self.agent_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body));
        if let Some(n) = times {
            mock = mock.up_to_n_times(n);
        }
        mock.mount(&self.server).await;
    }

    /// Answer the next poll with `instruction` embedded, once.
    pub async fn mount_poll_instruction(&self, instruction: &Instruction) {
        let body = json!({
            "status": "ok",
            "instruction": instruction,
        });
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/agents/{}/poll", self.agent_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .up_to_n_times(1)
            .mount(&self.server)
            .await;
    }

    /// Accept any number of `PATCH .../instructions/{id}` calls with a
    /// trivial acknowledgement.
    pub async fn mount_update_ok(&self, instruction_id: &str) {
        Mock::given(method("PATCH"))
            .and(path(format!("/api/v1/agents/{}/instructions/{instruction_id}", self.agent_id)))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "updated_fields": ["status"] })))
            .mount(&self.server)
            .await;
    }

    /// Accept a `POST .../instructions/{id}/result` call with a trivial
    /// acknowledgement.
    pub async fn mount_result_ok(&self, instruction_id: &str) {
        Mock::given(method("POST"))
            .and(path(format!(
                "/api/v1/agents/{}/instructions/{instruction_id}/result",
                self.agent_id
            )))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "acknowledged": true,
                "instruction_id": instruction_id,
            })))
            .mount(&self.server)
            .await;
    }

    /// `401` for every poll, used to exercise the two-consecutive-401
    /// degraded-auth path.
    pub async fn mount_poll_unauthorized(&self) {
        Mock::given(method("GET"))
            .and(path(format!("/api/v1/agents/{}/poll", self.agent_id)))
            .respond_with(ResponseTemplate::new(401))
            .mount(&self.server)
            .await;
    }

    /// The requests this server has received so far, for post-hoc
    /// assertions on call counts/paths.
    ///
    /// # Panics
    ///
    /// Panics if request recording was not enabled (it is, by default,
    /// for every server this type starts).
    pub async fn received(&self) -> Vec<wiremock::Request> {
        self.server.received_requests().await.expect("request recording enabled")
    }
}
