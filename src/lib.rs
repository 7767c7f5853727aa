// Formstore Library - form submissions with a draft/submit/withdraw lifecycle
// This exposes the core components for the CLI and for embedding

pub mod config;
pub mod error;
pub mod export;
pub mod forms;
pub mod observability;
pub mod preview;
pub mod storage;
pub mod submissions;
pub mod telemetry;

#[cfg(feature = "database")]
pub mod cli;

// Re-export key types for easy access
pub use config::{config, FormStoreConfig};
pub use error::{FormStoreError, Result};
pub use export::EmailExport;
pub use forms::{FieldDef, FieldType, Form, FormSchema, RecordRegistry, RelationDef};
pub use observability::{create_lifecycle_span, lifecycle_metrics, LifecycleMetrics, OperationTimer};
pub use preview::SubmissionPreview;
pub use storage::{MemoryStore, NewSubmitter, SubmissionStore};
#[cfg(feature = "database")]
pub use storage::SqliteStore;
pub use submissions::{
    EventBus, LifecycleEvent, LifecycleListener, Submission, SubmissionQuery, SubmissionService,
    SubmissionState,
};
pub use telemetry::{generate_correlation_id, init_telemetry, shutdown_telemetry};
