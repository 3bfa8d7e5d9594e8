//! Workflow Loop (§4.7): the single cooperative task that owns all
//! mutation of `WorkflowState`. Two independent tickers (heartbeat, poll)
//! plus a tracked in-flight dispatch, raced in one `tokio::select!`,
//! grounded on the teacher's `spawn_health_loop`/`spawn_session_cleanup_
//! loop` shape (`tokio::time::interval` ticker loops) generalized from
//! several independent background tasks down to one loop that also has to
//! interleave a long-running synchronous dispatch with its own tickers.
//!
//! The in-flight dispatch is tracked as a `tokio::spawn`ed `JoinHandle`
//! rather than a `Pin<Box<dyn Future>>` held across loop iterations: this
//! sidesteps self-referential-future lifetime plumbing entirely (the
//! teacher's background loops are themselves always `tokio::spawn`ed
//! tasks, so spawning the one operation that must run concurrently with
//! the loop's own ticks is the same idiom, just applied one level in).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, SystemTime};

use chrono::Utc;
use serde_json::Value;
use stavily_core::{AgentMetrics, ComponentHealth, Instruction, InstructionResult, InstructionType, WorkflowState};
use stavily_dispatcher::{DispatchContext, dispatch};
use stavily_orchestrator_client::{ClientError, HeartbeatState, InstructionStatus, OrchestratorClient};
use stavily_telemetry::RequestContext;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::health::HealthAggregator;

/// Collaborators and cadence the Workflow Loop needs. `heartbeat_interval`
/// is fixed for the loop's lifetime; `poll_interval` is only the starting
/// cadence — `nextPollInterval` hints can change it at runtime.
pub struct WorkflowLoop {
    client: Arc<OrchestratorClient>,
    dispatch_ctx: Arc<DispatchContext>,
    health: HealthAggregator,
    metrics: Arc<AgentMetrics>,
    heartbeat_interval: Duration,
    poll_interval: Duration,
    auth_degraded: Arc<AtomicBool>,
    heartbeat_failing: Arc<AtomicBool>,
    /// Token file mtime observed at the moment polling degraded, so the
    /// next tick can tell "nothing changed, stay quiet" apart from "the
    /// file rotated, worth a recovery probe" (§4.2, §7).
    degraded_since_mtime: StdMutex<Option<SystemTime>>,
}

impl WorkflowLoop {
    #[must_use]
    pub fn new(
        client: Arc<OrchestratorClient>,
        dispatch_ctx: Arc<DispatchContext>,
        health: HealthAggregator,
        metrics: Arc<AgentMetrics>,
        heartbeat_interval: Duration,
        poll_interval: Duration,
    ) -> Self {
        let auth_degraded = Arc::new(AtomicBool::new(false));
        let heartbeat_failing = Arc::new(AtomicBool::new(false));

        let auth_probe = Arc::clone(&auth_degraded);
        health.register("auth", move || {
            if auth_probe.load(Ordering::Relaxed) {
                ComponentHealth::degraded("two consecutive 401s from the orchestrator")
            } else {
                ComponentHealth::healthy()
            }
        });
        let heartbeat_probe = Arc::clone(&heartbeat_failing);
        health.register("heartbeat", move || {
            if heartbeat_probe.load(Ordering::Relaxed) {
                ComponentHealth::degraded("last heartbeat attempt failed")
            } else {
                ComponentHealth::healthy()
            }
        });

        Self {
            client,
            dispatch_ctx,
            health,
            metrics,
            heartbeat_interval,
            poll_interval,
            auth_degraded,
            heartbeat_failing,
            degraded_since_mtime: StdMutex::new(None),
        }
    }

    #[must_use]
    pub fn health(&self) -> &HealthAggregator {
        &self.health
    }

    /// `start(cancellation) -> ()` (§4.7). Runs until `cancellation` fires,
    /// then performs the graceful stop sequence bounded by `stop_grace`.
    /// When `once` is set, dispatches at most one poll cycle (used by the
    /// `--once` CLI flag for scripted/debug runs) instead of looping
    /// forever.
    pub async fn run(&self, cancellation: CancellationToken, stop_grace: Duration, once: bool) {
        let mut state = WorkflowState::new();
        state.running = true;
        state.start_time = Some(Utc::now());

        let mut heartbeat_ticker = tokio::time::interval(self.heartbeat_interval);
        heartbeat_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut poll_ticker = tokio::time::interval(self.poll_interval);
        poll_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut dispatch_handle: Option<JoinHandle<InstructionResult>> = None;

        loop {
            tokio::select! {
                biased;
                () = cancellation.cancelled() => break,

                _ = heartbeat_ticker.tick() => {
                    self.send_heartbeat(HeartbeatState::Online).await;
                }

                _ = poll_ticker.tick(), if dispatch_handle.is_none() => {
                    if let Some(new_interval) = self.poll_once(&mut state).await {
                        poll_ticker = tokio::time::interval(new_interval);
                        poll_ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                    }
                    if let Some(instruction) = state.current_instruction.clone() {
                        dispatch_handle = Some(self.spawn_dispatch(instruction, cancellation.clone()));
                    } else if once {
                        break;
                    }
                }

                result = Self::await_handle(&mut dispatch_handle), if dispatch_handle.is_some() => {
                    dispatch_handle = None;
                    self.finish_dispatch(&mut state, result).await;
                    if once {
                        break;
                    }
                }
            }
        }

        self.stop(&mut state, dispatch_handle, stop_grace).await;
    }

    /// Poll once if no instruction is currently in flight. Returns `Some`
    /// cadence when the orchestrator supplied a positive `nextPollInterval`
    /// hint, which the caller adopts no later than the following tick.
    ///
    /// While auth is degraded, polling ceases (§7, §8): a tick only
    /// attempts `poll` again once the token file's mtime has advanced past
    /// the value observed when degradation began. Heartbeats are
    /// unaffected and keep firing on their own ticker regardless.
    ///
    /// Correlated under a [`RequestContext`] span so the poll attempt and
    /// everything it logs (including the instruction it may pick up) can
    /// be grepped together by `request_id`.
    async fn poll_once(&self, state: &mut WorkflowState) -> Option<Duration> {
        let ctx = RequestContext::new("workflow").with_operation("poll");
        self.poll_once_inner(state).instrument(ctx.span()).await
    }

    async fn poll_once_inner(&self, state: &mut WorkflowState) -> Option<Duration> {
        if self.auth_degraded.load(Ordering::Relaxed) && !self.token_rotated_since_degraded() {
            return None;
        }

        match self.client.poll().await {
            Ok(response) => {
                self.auth_degraded.store(false, Ordering::Relaxed);
                *self.degraded_since_mtime.lock().expect("lock poisoned") = None;
                if let Some(instruction) = response.instruction {
                    AgentMetrics::incr(&self.metrics.instructions_received);
                    state.current_instruction = Some(instruction);
                    state.execution_log.clear();
                }
                response.next_poll_interval.filter(|&secs| secs > 0).map(Duration::from_secs)
            },
            Err(ClientError::Auth(message)) => {
                tracing::warn!(error = %message, "poll failed authentication");
                self.auth_degraded.store(true, Ordering::Relaxed);
                let mtime = self.client.token_file_mtime();
                *self.degraded_since_mtime.lock().expect("lock poisoned") = Some(mtime.unwrap_or(SystemTime::now()));
                None
            },
            Err(err) => {
                tracing::warn!(error = %err, "poll failed");
                None
            },
        }
    }

    /// Whether the token file has a different mtime than the one recorded
    /// when auth degraded, i.e. whether a recovery probe is worth the
    /// request. Always `true` if no baseline was recorded (shouldn't
    /// happen while degraded, but fail open rather than wedge the loop).
    fn token_rotated_since_degraded(&self) -> bool {
        let baseline = *self.degraded_since_mtime.lock().expect("lock poisoned");
        match (baseline, self.client.token_file_mtime()) {
            (Some(then), Some(now)) => now != then,
            (Some(_), None) => false,
            (None, _) => true,
        }
    }

    /// Spawns the dispatch under its own [`RequestContext`] span, distinct
    /// from the poll cycle that picked up `instruction`, since a dispatch
    /// can outlive several poll ticks.
    fn spawn_dispatch(&self, instruction: Instruction, cancellation: CancellationToken) -> JoinHandle<InstructionResult> {
        let ctx = Arc::clone(&self.dispatch_ctx);
        let request_ctx = RequestContext::new("workflow").with_operation("dispatch");
        let span = request_ctx.span();
        tokio::spawn(async move { dispatch(&ctx, &instruction, &cancellation).await }.instrument(span))
    }

    async fn await_handle(handle: &mut Option<JoinHandle<InstructionResult>>) -> Result<InstructionResult, tokio::task::JoinError> {
        handle.as_mut().expect("guarded by is_some() in select!").await
    }

    async fn finish_dispatch(&self, state: &mut WorkflowState, result: Result<InstructionResult, tokio::task::JoinError>) {
        let Some(instruction) = state.current_instruction.take() else {
            tracing::error!("dispatch completed with no instruction recorded as in flight");
            return;
        };

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(join_err) => {
                tracing::error!(error = %join_err, "dispatch task panicked or was cancelled");
                crashed_result(&instruction, join_err.to_string())
            },
        };

        state.execution_log.extend(outcome.processing_logs.clone());
        self.record_metrics(&instruction, &outcome);
        self.submit_result(&instruction, &outcome).await;
    }

    fn record_metrics(&self, instruction: &Instruction, outcome: &InstructionResult) {
        match instruction.instruction_type {
            InstructionType::PluginInstall | InstructionType::PluginUpdate => {
                if outcome.success {
                    AgentMetrics::incr(&self.metrics.install_successes);
                } else {
                    AgentMetrics::incr(&self.metrics.install_failures);
                }
            },
            InstructionType::Execute => {
                if outcome.success {
                    AgentMetrics::incr(&self.metrics.execution_successes);
                } else {
                    AgentMetrics::incr(&self.metrics.execution_failures);
                }
            },
        }
        if outcome.success {
            AgentMetrics::incr(&self.metrics.instructions_completed);
        } else {
            AgentMetrics::incr(&self.metrics.instructions_failed);
        }
    }

    async fn submit_result(&self, instruction: &Instruction, outcome: &InstructionResult) {
        let status = if outcome.success { InstructionStatus::Completed } else { InstructionStatus::Failed };
        let result_value: Option<Value> = if outcome.success {
            match instruction.instruction_type {
                InstructionType::Execute => outcome.execution_result.as_ref().and_then(|r| serde_json::to_value(r).ok()),
                InstructionType::PluginInstall | InstructionType::PluginUpdate => {
                    outcome.install_result.as_ref().and_then(|r| serde_json::to_value(r).ok())
                },
            }
        } else {
            None
        };

        if let Err(err) = self
            .client
            .submit_instruction_result(
                &instruction.id,
                status,
                result_value.as_ref(),
                outcome.error.as_deref(),
                None,
                &outcome.processing_logs,
            )
            .await
        {
            tracing::error!(instruction_id = %instruction.id, error = %err, "failed to submit instruction result; orchestrator is expected to re-issue");
        }
    }

    async fn send_heartbeat(&self, state_value: HeartbeatState) {
        let ctx = RequestContext::new("workflow").with_operation("heartbeat");
        self.send_heartbeat_inner(state_value).instrument(ctx.span()).await;
    }

    async fn send_heartbeat_inner(&self, state_value: HeartbeatState) {
        AgentMetrics::incr(&self.metrics.heartbeats);
        if let Err(err) = self.client.heartbeat(state_value).await {
            AgentMetrics::incr(&self.metrics.heartbeat_errors);
            self.heartbeat_failing.store(true, Ordering::Relaxed);
            tracing::warn!(error = %err, "heartbeat failed, not fatal");
        } else {
            self.heartbeat_failing.store(false, Ordering::Relaxed);
        }
    }

    /// Graceful stop (§4.7): let an in-flight dispatch observe
    /// cancellation (the same token was threaded into it), send one
    /// best-effort final `heartbeat(offline)`, all bounded by
    /// `stop_grace`.
    async fn stop(&self, state: &mut WorkflowState, dispatch_handle: Option<JoinHandle<InstructionResult>>, stop_grace: Duration) {
        let deadline = tokio::time::Instant::now() + stop_grace;

        if let Some(handle) = dispatch_handle {
            match tokio::time::timeout_at(deadline, handle).await {
                Ok(Ok(outcome)) => self.finish_dispatch(state, Ok(outcome)).await,
                Ok(Err(join_err)) => self.finish_dispatch(state, Err(join_err)).await,
                Err(_elapsed) => tracing::warn!("in-flight dispatch did not observe cancellation before the stop deadline"),
            }
        }

        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        if tokio::time::timeout(remaining, self.send_heartbeat(HeartbeatState::Offline)).await.is_err() {
            tracing::warn!("final offline heartbeat did not complete before the stop deadline");
        }

        state.running = false;
    }
}

fn crashed_result(instruction: &Instruction, message: String) -> InstructionResult {
    let now = Utc::now();
    InstructionResult {
        instruction_id: instruction.id.clone(),
        instruction_type: instruction.instruction_type,
        success: false,
        install_result: None,
        execution_result: None,
        processing_logs: vec![format!("dispatch task failed: {message}")],
        start_time: now,
        end_time: now,
        duration_seconds: 0.0,
        error: Some(message),
    }
}
