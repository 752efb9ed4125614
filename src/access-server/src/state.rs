use quill_access::{
    AccessConfig, AccessEngine, IdentityVerifier, RoleAssignmentService, RoleAssignmentStore,
};
use std::sync::Arc;
use std::time::Instant;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Access decision engine
    pub engine: Arc<AccessEngine>,

    /// Serialized role reassignment
    pub assignments: RoleAssignmentService,

    /// Bearer token verification
    pub verifier: Arc<dyn IdentityVerifier>,

    /// Server start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    /// Wire the engine and the assignment service over one store.
    ///
    /// Both share the same resolver, so its cache serves decisions and
    /// assignment validation alike.
    pub fn new<S>(store: Arc<S>, config: AccessConfig, verifier: Arc<dyn IdentityVerifier>) -> quill_access::Result<Self>
    where
        S: RoleAssignmentStore + 'static,
    {
        let engine = AccessEngine::new(store.clone(), config)?;
        let assignments = RoleAssignmentService::new(store, engine.resolver().clone(), engine.policy().clone());

        Ok(Self {
            engine: Arc::new(engine),
            assignments,
            verifier,
            start_time: Instant::now(),
        })
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
