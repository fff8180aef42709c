//! Scenario scripting.
//!
//! Scripts are UTF-8 text, one command per line, driving the book registry
//! and position tracker. [`command`] tokenizes lines; [`runner`] executes
//! them and reports per-scenario results.

pub mod command;
pub mod runner;

pub use command::{parse_line, CommandKind, ScenarioCommand};
pub use runner::{ScenarioResult, ScenarioRunner, ScenarioStats};
