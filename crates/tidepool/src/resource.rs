use std::fmt;

use boa_engine::Context;

/// Default loop iteration budget per execution surface.
pub const DEFAULT_MAX_LOOP_ITERATIONS: u64 = 10_000_000;
/// Default recursion depth for script function calls.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1_000;

/// Error returned when an execution surface cannot be provided.
///
/// Limit overruns during evaluation surface as script errors (the engine
/// throws a `RuntimeLimit` error into the snippet); this type only covers
/// failures of the surface itself.
#[derive(Debug, Clone)]
pub enum ResourceError {
    /// The private global surface could not be allocated or initialized.
    Surface(String),
    /// The context was destroyed and can no longer execute.
    Destroyed,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Surface(msg) => write!(f, "execution surface unavailable: {msg}"),
            Self::Destroyed => write!(f, "execution context was destroyed"),
        }
    }
}

impl std::error::Error for ResourceError {}

/// Configuration for cooperative execution limits.
///
/// All limits are optional - set to `None` to disable a specific limit.
/// Use `ResourceLimits::default()` for no limits, or build custom limits
/// with the builder pattern. Limits are applied to the engine when a
/// context initializes; there is no preemptive cancellation.
#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct ResourceLimits {
    /// Maximum loop iterations per evaluation.
    pub max_loop_iterations: Option<u64>,
    /// Maximum script recursion depth (function call stack depth).
    pub max_recursion_depth: Option<usize>,
    /// Maximum engine value-stack size.
    pub max_stack_size: Option<usize>,
}

impl ResourceLimits {
    /// Creates limits with conservative defaults: 10M loop iterations and a
    /// recursion depth of 1000.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_loop_iterations: Some(DEFAULT_MAX_LOOP_ITERATIONS),
            max_recursion_depth: Some(DEFAULT_MAX_RECURSION_DEPTH),
            max_stack_size: None,
        }
    }

    /// Sets the maximum loop iterations per evaluation.
    #[must_use]
    pub fn max_loop_iterations(mut self, limit: u64) -> Self {
        self.max_loop_iterations = Some(limit);
        self
    }

    /// Sets the maximum script recursion depth.
    #[must_use]
    pub fn max_recursion_depth(mut self, limit: usize) -> Self {
        self.max_recursion_depth = Some(limit);
        self
    }

    /// Sets the maximum engine value-stack size.
    #[must_use]
    pub fn max_stack_size(mut self, limit: usize) -> Self {
        self.max_stack_size = Some(limit);
        self
    }

    /// Applies the configured limits to an engine context.
    pub fn apply(&self, context: &mut Context) {
        if let Some(limit) = self.max_loop_iterations {
            context.runtime_limits_mut().set_loop_iteration_limit(limit);
        }
        if let Some(limit) = self.max_recursion_depth {
            context.runtime_limits_mut().set_recursion_limit(limit);
        }
        if let Some(limit) = self.max_stack_size {
            context.runtime_limits_mut().set_stack_size_limit(limit);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_each_limit() {
        let limits = ResourceLimits::default()
            .max_loop_iterations(500)
            .max_recursion_depth(32)
            .max_stack_size(4096);
        assert_eq!(limits.max_loop_iterations, Some(500));
        assert_eq!(limits.max_recursion_depth, Some(32));
        assert_eq!(limits.max_stack_size, Some(4096));
    }

    #[test]
    fn defaults_are_conservative() {
        let limits = ResourceLimits::new();
        assert_eq!(limits.max_loop_iterations, Some(DEFAULT_MAX_LOOP_ITERATIONS));
        assert_eq!(limits.max_recursion_depth, Some(DEFAULT_MAX_RECURSION_DEPTH));
        assert_eq!(limits.max_stack_size, None);
    }
}
