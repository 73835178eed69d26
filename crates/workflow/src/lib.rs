pub mod attachments;
pub mod builder;
pub mod directory;
pub mod engine;
pub mod error;
pub mod views;

pub use attachments::{AttachmentMapper, RawUpload, UploadSet};
pub use builder::WorkflowEngineBuilder;
pub use directory::{StaticDirectory, UserDirectory};
pub use engine::WorkflowEngine;
pub use error::WorkflowError;
pub use views::LaporanView;
