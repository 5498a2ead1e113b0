//! promptline: queued, single-flight dispatch of prompts to text-generation backends
//!
//! Submitted prompts wait in an in-memory FIFO; one job at a time goes to the selected
//! provider, the result lands in a hybrid store (sled metadata rows plus one content
//! file per response), and a short title is generated before the next job starts.

pub mod cli;
pub mod config;
pub mod error;
pub mod estimate;
pub mod events;
pub mod logging;
pub mod provider;
pub mod queue;
pub mod scheduler;
pub mod store;
pub mod title;
pub mod types;

pub use error::{ApiError, ProviderError, ProviderErrorKind, StorageError};
pub use events::{EventBus, EventEnvelope, Notification};
pub use queue::{Job, JobSpec, JobStatus};
pub use scheduler::{QueueStatus, Scheduler, StartupReport, SubmitOutcome};
pub use store::{ResponseMetadata, ResponseStatus, ResponseStore, ResponseWithContent, TitleStatus};
pub use title::{TitleGenerationConfig, TitleOutcome};
pub use types::{JobId, ResponseId};
