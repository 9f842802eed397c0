mod progress;
mod service;
mod ticker;
mod view;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use progress::SessionProgress;
pub use service::LiveSession;
pub use ticker::{SessionTicker, TickSignal};
pub use view::{SubmissionListItem, SubmissionService};
pub use workflow::SessionWorkflowService;
