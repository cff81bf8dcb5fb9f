pub mod error;
pub mod handlers;
pub mod model;
pub mod workflow;

pub use error::WorkflowError;
pub use model::{Document, Stage};
pub use workflow::DocumentWorkflow;
