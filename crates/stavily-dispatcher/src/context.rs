use std::sync::Arc;

use stavily_core::AgentPolicy;
use stavily_orchestrator_client::OrchestratorClient;
use stavily_plugin_store::PluginStore;

/// The collaborators one `dispatch` call needs. Owned by the Workflow Loop
/// and handed to the dispatcher by reference per call; `policy` is fixed
/// for the lifetime of the agent (derived once from its role at startup),
/// not re-derived per instruction.
pub struct DispatchContext {
    pub plugin_store: Arc<PluginStore>,
    pub orchestrator: Arc<OrchestratorClient>,
    pub policy: AgentPolicy,
}

impl DispatchContext {
    #[must_use]
    pub fn new(plugin_store: Arc<PluginStore>, orchestrator: Arc<OrchestratorClient>, policy: AgentPolicy) -> Self {
        Self {
            plugin_store,
            orchestrator,
            policy,
        }
    }
}
