pub mod error;
pub mod factory;
pub mod handlers;
pub mod locks;
pub mod memory;
pub mod model;
pub mod queue_service;
pub mod repo;
pub mod runner;
pub mod store;

pub use error::{JobError, StoreError, StoreResult};
pub use factory::{JobStoreDriver, JobStoreFactory};
pub use handlers::{HandlerRegistry, JobHandler};
pub use locks::{CooldownStatus, CooldownWindow, LockEvaluator, LockStatus};
pub use memory::InMemoryJobStore;
pub use model::{Job, JobPayload, JobPriority, JobStatus, JobType, NewJob};
pub use repo::JobsRepo;
pub use runner::{JobRunner, TickOutcome};
pub use store::JobStore;
