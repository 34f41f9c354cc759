//! Invoker contract
//!
//! The invoker owns activity behaviour: it executes an activity for the
//! first time and resumes it after a halt. The core only consumes the
//! outcome it returns.

use crate::application::halt::ExecutionContext;
use crate::domain::activity::ActivityId;
use crate::types::RuntimeValue;
use crate::CoreError;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Endpoint name used by activities with a single output
pub const DONE_ENDPOINT: &str = "done";

/// What an activity produced when executed or resumed
#[derive(Debug, Clone, PartialEq)]
pub enum ActivityOutcome {
    /// Continue to the targets of the named output endpoints
    Continue {
        /// Endpoints to follow; empty ends this branch
        endpoints: Vec<String>,
        /// Value recorded as the current scope's last result
        output: Option<RuntimeValue>,
    },

    /// The activity needs to suspend the workflow here
    Halt,

    /// Finish the whole workflow
    Finish,

    /// The activity failed
    Fault(String),
}

impl ActivityOutcome {
    /// Continue along the `done` endpoint without output
    pub fn done() -> Self {
        Self::endpoint(DONE_ENDPOINT)
    }

    /// Continue along a single named endpoint without output
    pub fn endpoint(name: impl Into<String>) -> Self {
        Self::Continue {
            endpoints: vec![name.into()],
            output: None,
        }
    }

    /// Continue along the `done` endpoint, recording an output value
    pub fn done_with(output: RuntimeValue) -> Self {
        Self::Continue {
            endpoints: vec![DONE_ENDPOINT.to_string()],
            output: Some(output),
        }
    }

    /// Check if this outcome asks for a halt
    #[inline]
    pub fn is_halt(&self) -> bool {
        matches!(self, Self::Halt)
    }
}

/// Dispatches execution to concrete activity behaviour
#[async_trait]
pub trait ActivityInvoker: Send + Sync {
    /// Execute an activity as part of a forward pass
    async fn execute_activity(
        &self,
        ctx: &mut ExecutionContext<'_>,
        activity_id: &ActivityId,
        cancel: &CancellationToken,
    ) -> Result<ActivityOutcome, CoreError>;

    /// Resume an activity that previously asked to halt
    async fn resume_activity(
        &self,
        ctx: &mut ExecutionContext<'_>,
        activity_id: &ActivityId,
        cancel: &CancellationToken,
    ) -> Result<ActivityOutcome, CoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_helpers() {
        assert_eq!(
            ActivityOutcome::done(),
            ActivityOutcome::Continue {
                endpoints: vec!["done".to_string()],
                output: None
            }
        );
        assert_eq!(
            ActivityOutcome::endpoint("true"),
            ActivityOutcome::Continue {
                endpoints: vec!["true".to_string()],
                output: None
            }
        );

        let with_output = ActivityOutcome::done_with(RuntimeValue::from(5i64));
        assert!(matches!(
            with_output,
            ActivityOutcome::Continue { output: Some(_), .. }
        ));
        assert!(ActivityOutcome::Halt.is_halt());
        assert!(!ActivityOutcome::Finish.is_halt());
    }
}
