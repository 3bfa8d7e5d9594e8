//! Request/operation correlation context.

use tracing::Span;
use uuid::Uuid;

/// A correlation context for one logical operation (an instruction
/// dispatch, a poll cycle). Carries an id and an optional operation name
/// into a `tracing::Span` so related log lines can be grepped together.
#[derive(Debug, Clone)]
pub struct RequestContext {
    id: String,
    component: String,
    operation: Option<String>,
}

impl RequestContext {
    #[must_use]
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            component: component.into(),
            operation: None,
        }
    }

    #[must_use]
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The `tracing::Span` carrying this context's fields. Enter it (and
    /// keep the returned guard alive) for the duration of the operation.
    #[must_use]
    pub fn span(&self) -> Span {
        tracing::info_span!(
            "operation",
            request_id = %self.id,
            component = %self.component,
            operation = self.operation.as_deref().unwrap_or("unknown"),
        )
    }
}

/// An entered [`RequestContext`] span, kept alive for the operation's
/// duration; exits the span when dropped.
pub struct RequestGuard(tracing::span::EnteredSpan);

impl RequestContext {
    /// Enter this context's span, returning a guard that exits it on drop.
    #[must_use]
    pub fn enter(&self) -> RequestGuard {
        RequestGuard(self.span().entered())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_carries_a_unique_id() {
        let a = RequestContext::new("dispatcher");
        let b = RequestContext::new("dispatcher");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn with_operation_is_fluent() {
        let ctx = RequestContext::new("dispatcher").with_operation("install");
        assert_eq!(ctx.operation.as_deref(), Some("install"));
    }
}
