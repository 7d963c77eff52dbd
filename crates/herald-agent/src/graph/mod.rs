//! Workflow graph engine.
//!
//! A run walks a fixed graph of [`Stage`]s:
//!
//! ```text
//! input_collection -> content_creation -> content_approval
//! content_approval -> content_creation   (rejected, regenerate)
//! content_approval -> scheduling
//! scheduling       -> scheduling         (waiting for the posting window)
//! scheduling       -> posting -> logging
//! ```
//!
//! Each stage returns a `StateUpdate` that the [`GraphEngine`] merges into
//! its working copy of the state. Branches are decided by the pure
//! predicates in [`edge`].

pub mod edge;
pub mod executor;
pub mod stage;

pub use edge::{after_approval, after_input, after_scheduling, next_stage};
pub use executor::{EngineSettings, GraphEngine, RunReport};
pub use stage::Stage;
