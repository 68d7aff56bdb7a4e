//! Intake commands shared by the HTTP and CLI surfaces.

mod intake;
pub mod types;

pub use intake::{IntakeApi, IntakeService};
pub use types::{
    ChatAnswer, DocumentDeadlines, DocumentSummary, ErrorKind, IntakeError, UploadOutcome,
};
