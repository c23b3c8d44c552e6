//! Multi-session manager for the Tidepool kernel.
//!
//! `SessionManager` wraps a registry of named [`ExecutionContext`] instances
//! and provides a typed API for session lifecycle, code execution, and
//! introspection.
//!
//! A "default" session is always present and is used when callers pass `None`
//! as the session ID. This provides a clean upgrade path from single-session
//! usage to multi-session orchestration.

use std::{
    collections::HashMap,
    fmt,
    time::{Duration, Instant},
};

use crate::{
    complete::CompletionItem,
    context::{ExecutionContext, ExecutionResult},
    error::KernelError,
    inspect::{DetailLevel, HoverInfo},
    resource::ResourceLimits,
    variables::{DEFAULT_EXPANSION_LIMIT, VariableInfo},
};

/// The name of the session that is always present and cannot be destroyed.
const DEFAULT_SESSION_ID: &str = "default";
/// Default cap on concurrently live sessions, the default session included.
const DEFAULT_MAX_SESSIONS: usize = 32;
/// Default idle age past which `evict_idle` removes a session.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60 * 60);

// =============================================================================
// Error types
// =============================================================================

/// Errors that can occur during session management operations.
///
/// Separates domain-level failures (not found, already exists, invalid state,
/// limit exceeded) from kernel errors (`Kernel`). This lets callers
/// pattern-match on the failure category without string parsing.
#[derive(Debug)]
pub enum SessionError {
    /// A kernel error from the underlying execution context.
    Kernel(KernelError),
    /// The requested session was not found.
    NotFound(String),
    /// A session with the given ID already exists.
    AlreadyExists(String),
    /// The operation is invalid in the current state (e.g. destroying the
    /// default session).
    InvalidState(String),
    /// Creating the session would exceed the configured session limit.
    LimitExceeded(usize),
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Kernel(e) => write!(f, "{e}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::AlreadyExists(msg) => write!(f, "already exists: {msg}"),
            Self::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            Self::LimitExceeded(limit) => write!(f, "session limit of {limit} reached"),
        }
    }
}

impl std::error::Error for SessionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Kernel(e) => Some(e),
            _ => None,
        }
    }
}

impl From<KernelError> for SessionError {
    fn from(error: KernelError) -> Self {
        Self::Kernel(error)
    }
}

// =============================================================================
// Output types
// =============================================================================

/// Summary info for one active session, as returned by `list_sessions`.
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// The session ID.
    pub id: String,
    /// Number of tracked variables.
    pub variable_count: usize,
    /// Time since the session was last used.
    pub idle: Duration,
}

// =============================================================================
// Session entry (private)
// =============================================================================

/// One entry in the session registry.
struct SessionEntry {
    /// The live execution context.
    context: ExecutionContext,
    /// Last time any operation touched this session.
    last_used: Instant,
}

impl SessionEntry {
    fn new(limits: ResourceLimits) -> Self {
        Self {
            context: ExecutionContext::isolated(limits),
            last_used: Instant::now(),
        }
    }
}

// =============================================================================
// SessionManager
// =============================================================================

/// Multi-session manager over isolated execution contexts.
///
/// A "default" session is always present and is used when callers pass `None`
/// as the optional session ID parameter.
///
/// # Example
///
/// ```
/// use tidepool::SessionManager;
/// let mut mgr = SessionManager::new();
/// let result = mgr.execute(None, "let x = 42; x").unwrap();
/// assert!(result.success);
/// assert!(mgr.has_variable(None, "x").unwrap());
/// ```
pub struct SessionManager {
    /// Named sessions keyed by session ID.
    sessions: HashMap<String, SessionEntry>,
    /// Resource limits applied to each new or reset session.
    limits: ResourceLimits,
    /// Maximum number of concurrently live sessions.
    max_sessions: usize,
    /// Idle age past which `evict_idle` removes a session.
    idle_timeout: Duration,
}

impl SessionManager {
    /// Creates a new manager with a single "default" session using the
    /// default resource limits.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_limits(ResourceLimits::new())
    }

    /// Creates a new manager with explicit per-session resource limits.
    ///
    /// A "default" session is created immediately using the given limits.
    #[must_use]
    pub fn new_with_limits(limits: ResourceLimits) -> Self {
        let mut mgr = Self {
            sessions: HashMap::new(),
            limits: limits.clone(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
        };
        mgr.sessions
            .insert(DEFAULT_SESSION_ID.to_owned(), SessionEntry::new(limits));
        mgr
    }

    /// Configures the maximum number of concurrently live sessions.
    pub fn set_max_sessions(&mut self, max_sessions: usize) {
        self.max_sessions = max_sessions.max(1);
    }

    /// Configures the idle timeout used by [`evict_idle`](Self::evict_idle).
    pub fn set_idle_timeout(&mut self, idle_timeout: Duration) {
        self.idle_timeout = idle_timeout;
    }
}

// =============================================================================
// Execution and introspection
// =============================================================================

impl SessionManager {
    /// Executes a snippet in a session.
    ///
    /// Pass `None` for `session_id` to use the default session. A thrown
    /// script error is reported inside the `Ok` result.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotFound` if the session does not exist, or
    /// `SessionError::Kernel` when the context itself is unusable.
    pub fn execute(&mut self, session_id: Option<&str>, code: &str) -> Result<ExecutionResult, SessionError> {
        let entry = self.get_session_mut(resolve_session_id(session_id))?;
        Ok(entry.context.execute(code)?)
    }

    /// Lists a session's tracked variables with live previews.
    pub fn variables(&mut self, session_id: Option<&str>) -> Result<Vec<VariableInfo>, SessionError> {
        let entry = self.get_session_mut(resolve_session_id(session_id))?;
        Ok(entry.context.variables()?)
    }

    /// True when a session tracks the given variable name.
    pub fn has_variable(&mut self, session_id: Option<&str>, name: &str) -> Result<bool, SessionError> {
        let entry = self.get_session_mut(resolve_session_id(session_id))?;
        Ok(entry.context.has_variable(name))
    }

    /// Expands one container level of the value at `path` in a session.
    ///
    /// A `limit` of `None` uses the default expansion cap.
    pub fn expand_variable(
        &mut self,
        session_id: Option<&str>,
        path: &str,
        limit: Option<usize>,
    ) -> Result<Option<Vec<VariableInfo>>, SessionError> {
        let entry = self.get_session_mut(resolve_session_id(session_id))?;
        Ok(entry
            .context
            .expand_variable(path, limit.unwrap_or(DEFAULT_EXPANSION_LIMIT))?)
    }

    /// Completion candidates for a cursor position in a session.
    pub fn complete(
        &mut self,
        session_id: Option<&str>,
        source: &str,
        cursor: usize,
    ) -> Result<Vec<CompletionItem>, SessionError> {
        let entry = self.get_session_mut(resolve_session_id(session_id))?;
        Ok(entry.context.complete(source, cursor)?)
    }

    /// Hover payload for the identifier chain under a cursor in a session.
    pub fn hover(
        &mut self,
        session_id: Option<&str>,
        source: &str,
        cursor: usize,
        detail: DetailLevel,
    ) -> Result<Option<HoverInfo>, SessionError> {
        let entry = self.get_session_mut(resolve_session_id(session_id))?;
        Ok(entry.context.hover(source, cursor, detail)?)
    }
}

// =============================================================================
// Session lifecycle
// =============================================================================

impl SessionManager {
    /// Creates a new named session.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyExists` if a session with `id` exists,
    /// or `SessionError::LimitExceeded` at the session cap.
    pub fn create_session(&mut self, id: &str) -> Result<(), SessionError> {
        if self.sessions.contains_key(id) {
            return Err(SessionError::AlreadyExists(format!("session '{id}' already exists")));
        }
        if self.sessions.len() >= self.max_sessions {
            return Err(SessionError::LimitExceeded(self.max_sessions));
        }
        self.sessions
            .insert(id.to_owned(), SessionEntry::new(self.limits.clone()));
        Ok(())
    }

    /// Destroys a named session, releasing its engine surface.
    ///
    /// The default session cannot be destroyed.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::InvalidState` for the default session, or
    /// `SessionError::NotFound` if the session does not exist.
    pub fn destroy_session(&mut self, id: &str) -> Result<(), SessionError> {
        if id == DEFAULT_SESSION_ID {
            return Err(SessionError::InvalidState(format!(
                "cannot destroy the default session '{DEFAULT_SESSION_ID}'"
            )));
        }
        let Some(mut entry) = self.sessions.remove(id) else {
            return Err(SessionError::NotFound(format!("session '{id}' not found")));
        };
        entry.context.destroy();
        Ok(())
    }

    /// Resets a session to an empty tracked set and a fresh surface.
    ///
    /// Pass `None` for `session_id` to reset the default session.
    pub fn reset(&mut self, session_id: Option<&str>) -> Result<(), SessionError> {
        let entry = self.get_session_mut(resolve_session_id(session_id))?;
        entry.context.reset()?;
        Ok(())
    }

    /// Lists all active sessions with their variable counts and idle ages.
    ///
    /// Results are sorted by session ID for deterministic output.
    #[must_use]
    pub fn list_sessions(&self) -> Vec<SessionInfo> {
        let now = Instant::now();
        let mut sessions: Vec<SessionInfo> = self
            .sessions
            .iter()
            .map(|(id, entry)| SessionInfo {
                id: id.clone(),
                variable_count: entry.context.tracked().len(),
                idle: now.saturating_duration_since(entry.last_used),
            })
            .collect();
        sessions.sort_by(|a, b| a.id.cmp(&b.id));
        sessions
    }

    /// Removes sessions idle past the configured timeout.
    ///
    /// The default session is never evicted. Returns the IDs that were
    /// removed, sorted.
    pub fn evict_idle(&mut self) -> Vec<String> {
        let now = Instant::now();
        let timeout = self.idle_timeout;
        let mut evicted: Vec<String> = self
            .sessions
            .iter()
            .filter(|(id, entry)| {
                id.as_str() != DEFAULT_SESSION_ID && now.saturating_duration_since(entry.last_used) > timeout
            })
            .map(|(id, _)| id.clone())
            .collect();
        for id in &evicted {
            if let Some(mut entry) = self.sessions.remove(id) {
                entry.context.destroy();
            }
        }
        evicted.sort_unstable();
        evicted
    }

    /// Number of live sessions, the default included.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

// =============================================================================
// Private helpers
// =============================================================================

impl SessionManager {
    /// Looks up a session and refreshes its last-used timestamp.
    fn get_session_mut(&mut self, session_id: &str) -> Result<&mut SessionEntry, SessionError> {
        let entry = self
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SessionError::NotFound(format!("session '{session_id}' not found")))?;
        entry.last_used = Instant::now();
        Ok(entry)
    }
}

impl Default for SessionManager {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves an optional session ID to the default when `None`.
fn resolve_session_id(session_id: Option<&str>) -> &str {
    session_id.unwrap_or(DEFAULT_SESSION_ID)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn default_session_is_always_present() {
        let mgr = SessionManager::new();
        let sessions = mgr.list_sessions();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "default");
    }

    #[test]
    fn destroying_the_default_session_is_rejected() {
        let mut mgr = SessionManager::new();
        assert!(matches!(
            mgr.destroy_session("default"),
            Err(SessionError::InvalidState(_))
        ));
    }

    #[test]
    fn create_and_destroy_named_sessions() {
        let mut mgr = SessionManager::new();
        mgr.create_session("scratch").unwrap();
        assert_eq!(mgr.session_count(), 2);
        assert!(matches!(
            mgr.create_session("scratch"),
            Err(SessionError::AlreadyExists(_))
        ));
        mgr.destroy_session("scratch").unwrap();
        assert!(matches!(mgr.destroy_session("scratch"), Err(SessionError::NotFound(_))));
    }

    #[test]
    fn session_limit_is_enforced() {
        let mut mgr = SessionManager::new();
        mgr.set_max_sessions(2);
        mgr.create_session("a").unwrap();
        assert!(matches!(mgr.create_session("b"), Err(SessionError::LimitExceeded(2))));
    }

    #[test]
    fn unknown_session_is_not_found() {
        let mut mgr = SessionManager::new();
        assert!(matches!(
            mgr.execute(Some("ghost"), "1"),
            Err(SessionError::NotFound(_))
        ));
    }

    #[test]
    fn evict_idle_spares_the_default_session() {
        let mut mgr = SessionManager::new();
        mgr.set_idle_timeout(Duration::ZERO);
        mgr.create_session("old").unwrap();
        std::thread::sleep(Duration::from_millis(5));
        let evicted = mgr.evict_idle();
        assert_eq!(evicted, ["old"]);
        assert_eq!(mgr.session_count(), 1);
    }
}
