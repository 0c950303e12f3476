pub mod pool;
pub mod runner;
pub mod store;

pub use runner::JobRunner;
pub use store::{JobId, JobRecord, JobStatus, JobStore, ResultHandle};
