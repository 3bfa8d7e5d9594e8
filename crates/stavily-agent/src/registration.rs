//! One-shot startup registration (§6: `POST /api/v1/agents`).

use serde_json::json;
use stavily_core::AgentIdentity;
use stavily_orchestrator_client::{AgentRegistration, ClientResult, OrchestratorClient};

/// The engine-level capabilities every agent reports, regardless of role.
/// Role-specific capability negotiation (e.g. which trigger types a Sensor
/// supports) is configuration the orchestrator already has out of band;
/// this crate only reports what the dispatcher can do.
const CAPABILITIES: &[&str] = &["pluginInstall", "pluginUpdate", "execute"];

pub async fn register(client: &OrchestratorClient, identity: &AgentIdentity, demo_mode: bool) -> ClientResult<()> {
    let registration = AgentRegistration {
        id: &identity.id,
        name: &identity.id,
        agent_type: identity.role.as_str(),
        organization_id: &identity.organization_id,
        version: &identity.version,
        hostname: &identity.hostname,
        platform: &identity.platform,
        arch: &identity.arch,
        capabilities: CAPABILITIES.iter().map(|s| (*s).to_string()).collect(),
        config: json!({ "demo_mode": demo_mode }),
    };
    let response = client.register(&registration).await?;
    tracing::info!(agent_id = %response.agent_id, "registered with orchestrator");
    Ok(())
}
