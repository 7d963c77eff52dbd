//! The six workflow stages.
//!
//! Every stage reads the state and returns a `StateUpdate`; none of them
//! mutates the state or lets a collaborator error escape.

pub mod approval;
pub mod create;
pub mod input;
pub mod logging;
pub mod post;
pub mod schedule;

pub use approval::review;
pub use create::{create_content, parse_draft, Draft};
pub use input::collect_input;
pub use logging::flush_logs;
pub use post::post;
pub use schedule::schedule;
