//! Query service client: transport, retry policy and the job state machine.

pub mod job;
pub mod retry;
pub mod service;

pub use job::{Credentials, JobClient, JobState, JobStatus};
pub use retry::RetryPolicy;
pub use service::{EntityOutcome, HttpQueryService, JobProfile, JobStatusResponse, QueryService};
