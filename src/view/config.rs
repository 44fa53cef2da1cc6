use serde::{Deserialize, Serialize};
use tracing::Span;

/// What happens to the node cache when a store query fails mid-pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Keep merges applied before the failure.
    #[default]
    KeepPartial,
    /// Restore the node cache to its state at the start of the pass.
    Restore,
}

/// View construction parameters.
#[allow(missing_docs)]
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Free-form label recorded on the view's span.
    #[serde(default)]
    pub label: String,
    /// What a failed sync pass leaves in the node cache.
    #[serde(default)]
    pub on_failure: FailurePolicy,
    /// Span the view logs under. When absent one is created per view.
    #[serde(skip)]
    pub span: Option<Span>,
}

impl ViewConfig {
    #[must_use]
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    #[must_use]
    pub const fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    #[must_use]
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_keep_partial_state() {
        let cfg = ViewConfig::default();
        assert_eq!(cfg.on_failure, FailurePolicy::KeepPartial);
        assert!(cfg.label.is_empty());
        assert!(cfg.span.is_none());
    }

    #[test]
    fn deserializes_from_partial_json() {
        let cfg: ViewConfig = serde_json::from_str(r#"{"on_failure": "restore"}"#).unwrap();
        assert_eq!(cfg.on_failure, FailurePolicy::Restore);
        assert!(cfg.label.is_empty());
    }
}
