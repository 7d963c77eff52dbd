pub mod config;
pub mod error;
pub mod state;
pub mod traits;
pub mod types;

pub use config::AppConfig;
pub use error::{HeraldError, Result};
pub use state::{StateUpdate, WorkflowState};
pub use types::*;
