pub mod handlers;
pub mod model;
pub mod store;

pub use model::{Template, TemplateField};
pub use store::{TemplateError, TemplateStore};
