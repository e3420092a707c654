pub mod client;
pub mod config;
pub mod config_validator;
pub mod dispatcher;
pub mod document;
pub mod error;
pub mod metrics;
pub mod permit_pool;
pub mod serializer;
pub mod ticker;
pub mod transport;

pub use client::{Signature, SubmissionClient, SubmissionRequest, SubmissionResult, Submitted};
pub use config::Config;
pub use dispatcher::{PendingSubmission, SubmissionQueue};
pub use error::{SerializationError, ThrottlerError, ThrottlerResult, TransportError};
pub use permit_pool::{Permit, PermitPool, PoolStats};
