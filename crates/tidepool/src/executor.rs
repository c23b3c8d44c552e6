//! Language dispatch over execution contexts.
//!
//! `ExecutorRegistry` maps language names to [`Executor`] implementations so
//! embedding hosts route `(code, language)` pairs without hard-coding the
//! kernel's script engine. The registry ships with the JavaScript executor
//! registered under its common aliases; hosts may add their own.

use std::rc::Rc;

use ahash::AHashMap;

use crate::{
    classify::{self, Classification},
    context::{ExecutionContext, ExecutionResult},
    error::KernelError,
};

/// One language backend: executes snippets and classifies completeness.
pub trait Executor {
    /// Canonical language name, lowercase.
    fn language(&self) -> &'static str;

    /// Executes one snippet in the given context.
    fn execute(&self, context: &mut ExecutionContext, code: &str) -> Result<ExecutionResult, KernelError>;

    /// Classifies a snippet's statement completeness.
    fn classify(&self, code: &str) -> Classification;
}

/// The kernel's own JavaScript executor.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScriptExecutor;

impl Executor for ScriptExecutor {
    fn language(&self) -> &'static str {
        "javascript"
    }

    fn execute(&self, context: &mut ExecutionContext, code: &str) -> Result<ExecutionResult, KernelError> {
        context.execute(code)
    }

    fn classify(&self, code: &str) -> Classification {
        classify::classify(code)
    }
}

/// Registry of language executors keyed by case-insensitive alias.
pub struct ExecutorRegistry {
    executors: AHashMap<String, Rc<dyn Executor>>,
}

impl ExecutorRegistry {
    /// Creates a registry with the JavaScript executor registered under
    /// `"javascript"` and `"js"`.
    #[must_use]
    pub fn new() -> Self {
        let mut registry = Self {
            executors: AHashMap::new(),
        };
        registry.register(&["javascript", "js"], Rc::new(ScriptExecutor));
        registry
    }

    /// Registers an executor under one or more aliases.
    ///
    /// Aliases are matched case-insensitively; re-registering an alias
    /// replaces the previous executor.
    pub fn register(&mut self, aliases: &[&str], executor: Rc<dyn Executor>) {
        for alias in aliases {
            self.executors.insert(alias.to_lowercase(), executor.clone());
        }
    }

    /// Looks up the executor for a language.
    ///
    /// # Errors
    ///
    /// Returns `KernelError::UnsupportedLanguage` for unknown languages.
    pub fn get(&self, language: &str) -> Result<Rc<dyn Executor>, KernelError> {
        self.executors
            .get(&language.to_lowercase())
            .cloned()
            .ok_or_else(|| KernelError::UnsupportedLanguage(language.to_owned()))
    }

    /// Dispatches one snippet to the executor registered for `language`.
    ///
    /// An unknown language fails before any evaluation, leaving the context
    /// untouched.
    pub fn execute(
        &self,
        context: &mut ExecutionContext,
        code: &str,
        language: &str,
    ) -> Result<ExecutionResult, KernelError> {
        self.get(language)?.execute(context, code)
    }

    /// Lists registered aliases, sorted.
    #[must_use]
    pub fn languages(&self) -> Vec<String> {
        let mut names: Vec<String> = self.executors.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn javascript_aliases_are_registered() {
        let registry = ExecutorRegistry::new();
        assert!(registry.get("javascript").is_ok());
        assert!(registry.get("js").is_ok());
        assert!(registry.get("JS").is_ok(), "alias lookup is case-insensitive");
        assert_eq!(registry.languages(), ["javascript", "js"]);
    }

    #[test]
    fn unknown_language_is_a_typed_error() {
        let registry = ExecutorRegistry::new();
        let err = registry.get("python").map(|_| ()).unwrap_err();
        assert!(matches!(err, KernelError::UnsupportedLanguage(lang) if lang == "python"));
    }

    #[test]
    fn unknown_language_leaves_the_context_untouched() {
        let registry = ExecutorRegistry::new();
        let mut context = ExecutionContext::isolated(crate::resource::ResourceLimits::new());
        let result = registry.execute(&mut context, "x = 1", "cobol");
        assert!(result.is_err());
        assert!(context.tracked().is_empty());
    }
}
