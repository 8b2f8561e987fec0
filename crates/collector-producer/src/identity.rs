//! Site identity used to gate and label events.

use collector_config_and_utils::Config;

/// Source of the project and site identifiers.
///
/// Looked up on every request, so implementations may change their answer
/// at runtime. Events are only produced while both identifiers are present
/// and non-empty.
pub trait IdentityLookup: Send + Sync {
    fn project_id(&self) -> Option<String>;
    fn site_id(&self) -> Option<String>;
}

impl IdentityLookup for Config {
    fn project_id(&self) -> Option<String> {
        self.project_id.clone()
    }

    fn site_id(&self) -> Option<String> {
        self.site_id.clone()
    }
}

/// Fixed identifiers.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity {
    pub project_id: Option<String>,
    pub site_id: Option<String>,
}

impl StaticIdentity {
    pub fn new(project_id: impl Into<String>, site_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            site_id: Some(site_id.into()),
        }
    }
}

impl IdentityLookup for StaticIdentity {
    fn project_id(&self) -> Option<String> {
        self.project_id.clone()
    }

    fn site_id(&self) -> Option<String> {
        self.site_id.clone()
    }
}
