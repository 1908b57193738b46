use sellerflow::jobs::{HandlerRegistry, JobStore, JobType};
use sellerflow::sync::{ListingSyncHandler, NoopRefresher, TenantStore, TenantSyncOrchestrator};
use std::{sync::Arc, time::Duration};

/// Registers every job type this worker knows how to run.
pub fn build_registry(
    jobs: Arc<dyn JobStore>,
    tenants: Arc<dyn TenantStore>,
    handler_timeout: Option<Duration>,
) -> HandlerRegistry {
    let mut registry = HandlerRegistry::new();

    // Bounds itself so a timed-out pass still lands on the tenant row.
    registry.register(
        JobType::TenantSync,
        Arc::new(TenantSyncOrchestrator::new(jobs, tenants.clone()).with_timeout(handler_timeout)),
    );

    // TODO: swap NoopRefresher for the marketplace client once its credentials flow lands.
    registry.register_with_timeout(
        JobType::ListingSync,
        Arc::new(ListingSyncHandler::new(tenants, Arc::new(NoopRefresher))),
        handler_timeout,
    );

    registry
}
