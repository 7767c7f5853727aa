// Submissions: lifecycle, scopes, derived views and notifications

pub mod events;
pub mod scopes;
pub mod service;
pub mod state_machine;
pub mod types;
pub mod views;

pub use events::{
    ChannelListener, EventBus, LifecycleEvent, LifecycleListener, LoggingListener,
    RecordingListener,
};
pub use scopes::{active, by_form, in_state, in_state_with, Comparison, FormSelector, Predicate, SubmissionQuery};
pub use service::SubmissionService;
pub use state_machine::{next_state, SubmissionEvent};
pub use types::{
    status_label, DataRecord, DataRef, RelationRow, Submission, SubmissionState, Submitter,
};
pub use views::NotificationVars;
