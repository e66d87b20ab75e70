pub mod error;
pub mod submission;

pub use error::{Result, StoreError};
pub use submission::Submission;
