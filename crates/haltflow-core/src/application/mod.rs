/// Activity type catalogue and registry
pub mod catalogue;

/// Invoker contract for activity behaviour
pub mod invoker;

/// Halt/resume controller and per-attempt context
pub mod halt;

/// Execution attempts over a workflow
pub mod runner;
