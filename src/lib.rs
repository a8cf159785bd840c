pub mod allocator;
pub mod commands;
pub mod config;
pub mod detect;
pub mod error;
pub mod expression;
pub mod extract;
pub mod fs;
pub mod keys;
pub mod logging;
pub mod markup;
pub mod namespace;
pub mod pipeline;
pub mod program;
pub mod reconcile;
pub mod sfc;
pub mod store;

pub use error::{AutokeyError, Dialect};
pub use pipeline::{run, ExecOptions, FileOutcome, RunReport};
