//! In-memory stand-ins for the provisioning backend and the cloud API
//!
//! `ScriptedBackend` keeps a set of bound addresses and behaves like a tiny
//! state store, so orchestrator tests can run whole batches (including
//! running the same batch twice) without a real backend.

#![cfg(test)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::Mutex;

use crate::cloud::{Existence, ProbeError, ResourceProbe};
use crate::state::backend::{BackendError, PlanOutcome, StateBackend};

pub struct ScriptedBackend {
    bound: Mutex<BTreeSet<String>>,
    missing_ids: HashSet<String>,
    import_errors: HashMap<String, BackendError>,
    state: String,
    version: String,
    init_error: Option<BackendError>,
    pull_error: Option<BackendError>,
    list_error: Option<BackendError>,
    refresh_error: Option<BackendError>,
    validate_error: Option<BackendError>,
    plan: Result<PlanOutcome, BackendError>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            bound: Mutex::new(BTreeSet::new()),
            missing_ids: HashSet::new(),
            import_errors: HashMap::new(),
            state: r#"{"version":4,"resources":[]}"#.to_string(),
            version: "1.6.2".to_string(),
            init_error: None,
            pull_error: None,
            list_error: None,
            refresh_error: None,
            validate_error: None,
            plan: Ok(PlanOutcome::NoChanges),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_bound(self, address: &str) -> Self {
        self.bound.lock().unwrap().insert(address.to_string());
        self
    }

    /// Imports of `external_id` fail because the object does not exist
    pub fn with_missing_id(mut self, external_id: &str) -> Self {
        self.missing_ids.insert(external_id.to_string());
        self
    }

    pub fn with_import_error(mut self, external_id: &str, error: BackendError) -> Self {
        self.import_errors.insert(external_id.to_string(), error);
        self
    }

    pub fn with_state(mut self, state: &str) -> Self {
        self.state = state.to_string();
        self
    }

    pub fn with_version(mut self, version: &str) -> Self {
        self.version = version.to_string();
        self
    }

    pub fn with_init_error(mut self, error: BackendError) -> Self {
        self.init_error = Some(error);
        self
    }

    pub fn with_pull_error(mut self, error: BackendError) -> Self {
        self.pull_error = Some(error);
        self
    }

    pub fn with_list_error(mut self, error: BackendError) -> Self {
        self.list_error = Some(error);
        self
    }

    pub fn with_refresh_error(mut self, error: BackendError) -> Self {
        self.refresh_error = Some(error);
        self
    }

    pub fn with_validate_error(mut self, error: BackendError) -> Self {
        self.validate_error = Some(error);
        self
    }

    pub fn with_plan(mut self, plan: Result<PlanOutcome, BackendError>) -> Self {
        self.plan = plan;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Calls that change managed state
    pub fn mutating_calls(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with("import ") || c.starts_with("state rm "))
            .collect()
    }

    pub fn is_bound(&self, address: &str) -> bool {
        self.bound.lock().unwrap().contains(address)
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn fail_with(error: &Option<BackendError>) -> Result<(), BackendError> {
        match error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl StateBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "terraform"
    }

    fn init(&self) -> Result<(), BackendError> {
        self.record("init".to_string());
        Self::fail_with(&self.init_error)
    }

    fn version(&self) -> Result<String, BackendError> {
        self.record("version".to_string());
        Ok(self.version.clone())
    }

    fn state_pull(&self) -> Result<String, BackendError> {
        self.record("state pull".to_string());
        Self::fail_with(&self.pull_error)?;
        Ok(self.state.clone())
    }

    fn state_list(&self, address: Option<&str>) -> Result<Vec<String>, BackendError> {
        self.record(format!("state list {}", address.unwrap_or_default()).trim_end().to_string());
        Self::fail_with(&self.list_error)?;

        let bound = self.bound.lock().unwrap();
        Ok(bound
            .iter()
            .filter(|a| address.is_none_or(|wanted| a.as_str() == wanted))
            .cloned()
            .collect())
    }

    fn state_show(&self, address: &str) -> Result<Option<String>, BackendError> {
        self.record(format!("state show {}", address));
        Self::fail_with(&self.list_error)?;

        Ok(self
            .is_bound(address)
            .then(|| format!("# {}:\nresource {{}}\n", address)))
    }

    fn import(&self, address: &str, external_id: &str) -> Result<(), BackendError> {
        self.record(format!("import {} {}", address, external_id));

        if let Some(err) = self.import_errors.get(external_id) {
            return Err(err.clone());
        }
        if self.missing_ids.contains(external_id) {
            return Err(BackendError::NotFound(
                "Error: Cannot import non-existent remote object".to_string(),
            ));
        }

        let mut bound = self.bound.lock().unwrap();
        if !bound.insert(address.to_string()) {
            return Err(BackendError::AlreadyManaged(
                "Error: Resource already managed by Terraform".to_string(),
            ));
        }
        Ok(())
    }

    fn state_rm(&self, address: &str) -> Result<(), BackendError> {
        self.record(format!("state rm {}", address));
        self.bound.lock().unwrap().remove(address);
        Ok(())
    }

    fn refresh(&self) -> Result<(), BackendError> {
        self.record("refresh".to_string());
        Self::fail_with(&self.refresh_error)
    }

    fn validate(&self) -> Result<(), BackendError> {
        self.record("validate".to_string());
        Self::fail_with(&self.validate_error)
    }

    fn plan(&self, out: &Path) -> Result<PlanOutcome, BackendError> {
        self.record(format!("plan {}", out.display()));
        self.plan.clone()
    }
}

/// Cloud probe answering from fixed id sets; unknown ids exist
pub struct ScriptedProbe {
    missing: HashSet<String>,
    forbidden: HashSet<String>,
    error: Option<ProbeError>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedProbe {
    pub fn new() -> Self {
        Self {
            missing: HashSet::new(),
            forbidden: HashSet::new(),
            error: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn with_missing(mut self, external_id: &str) -> Self {
        self.missing.insert(external_id.to_string());
        self
    }

    pub fn with_forbidden(mut self, external_id: &str) -> Self {
        self.forbidden.insert(external_id.to_string());
        self
    }

    pub fn with_error(mut self, error: ProbeError) -> Self {
        self.error = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for ScriptedProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceProbe for ScriptedProbe {
    fn exists(&self, external_id: &str) -> Result<Existence, ProbeError> {
        self.calls.lock().unwrap().push(external_id.to_string());

        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.missing.contains(external_id) {
            Ok(Existence::NotFound)
        } else if self.forbidden.contains(external_id) {
            Ok(Existence::Forbidden)
        } else {
            Ok(Existence::Exists)
        }
    }
}
