pub mod graph;
pub mod run_log;
pub mod scheduler;
pub mod stages;
pub mod store;
pub mod time_match;
pub mod workflow;

pub use graph::{EngineSettings, GraphEngine, RunReport, Stage};
pub use run_log::RunLog;
pub use scheduler::{ScheduleMode, SchedulerLoop};
pub use store::StateStore;
pub use workflow::Workflow;
