pub mod environment;
pub mod error;
pub mod fixtures;
pub mod layout;
mod operators;
pub mod run;
mod stack;
pub mod structure;
pub mod syntax_tree;
pub mod value;

pub use error::{ErrorKind, ExecutionError, RunResult};
pub use layout::{Diagnostic, DiagnosticKind, IndentationPolicy};
pub use run::{run_source, RunReport, Runner, RunnerConfig};
pub use syntax_tree::{parse, ParseError};
