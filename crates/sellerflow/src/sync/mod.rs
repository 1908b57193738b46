pub mod listing;
pub mod memory;
pub mod model;
pub mod repo;
pub mod store;
pub mod tenant;
pub mod triggers;

pub use listing::{ListingRefresher, ListingSyncHandler, NoopRefresher};
pub use memory::InMemoryTenantStore;
pub use model::{Listing, Tenant, TenantSyncStatus};
pub use repo::TenantsRepo;
pub use store::TenantStore;
pub use tenant::{FanOutSummary, TenantSyncError, TenantSyncOrchestrator};
pub use triggers::{SyncTriggers, TriggerError, TriggerOutcome};
