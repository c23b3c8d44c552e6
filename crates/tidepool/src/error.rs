use std::{fmt, sync::OnceLock};

use boa_engine::{Context, JsError, js_string};
use regex::Regex;

use crate::resource::ResourceError;

/// Error type for kernel operations, separating failures by pipeline stage.
///
/// Keeping transform/execution/dispatch/resource failures distinct lets
/// callers handle user feedback and recovery policies accurately without
/// string matching.
#[derive(Debug, Clone)]
pub enum KernelError {
    /// Source rewriting produced an unusable unit before evaluation started.
    Transform(String),
    /// The script threw while executing (includes parse failures of the
    /// snippet itself).
    Execution(ExecutionError),
    /// No executor is registered for the requested content language.
    UnsupportedLanguage(String),
    /// The execution surface could not be allocated or is gone.
    Resource(ResourceError),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transform(msg) => write!(f, "transform error: {msg}"),
            Self::Execution(error) => write!(f, "{error}"),
            Self::UnsupportedLanguage(lang) => write!(f, "unsupported language: {lang}"),
            Self::Resource(error) => write!(f, "{error}"),
        }
    }
}

impl std::error::Error for KernelError {}

impl From<ExecutionError> for KernelError {
    fn from(error: ExecutionError) -> Self {
        Self::Execution(error)
    }
}

impl From<ResourceError> for KernelError {
    fn from(error: ResourceError) -> Self {
        Self::Resource(error)
    }
}

/// A structured script error extracted from an engine throw.
///
/// `kind` is the constructor name (`TypeError`, `SyntaxError`, a user class
/// name) or `"Error"` when the thrown value is not an error object. Line and
/// column are best-effort, parsed from the error text.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ExecutionError {
    /// Error constructor name, e.g. `TypeError`.
    pub kind: String,
    /// The error message without the leading kind prefix.
    pub message: String,
    /// Stack trace lines, outermost frame last. Empty when the engine
    /// provided no stack.
    pub traceback: Vec<String>,
    /// 1-based line within the executed snippet, when recoverable.
    pub line: Option<u32>,
    /// 1-based column within the line, when recoverable.
    pub column: Option<u32>,
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.kind)?;
        } else {
            write!(f, "{}: {}", self.kind, self.message)?;
        }
        for frame in &self.traceback {
            write!(f, "\n    {frame}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ExecutionError {}

impl ExecutionError {
    /// Builds a structured error from an engine throw.
    ///
    /// Reads `name`, `message`, and `stack` off the thrown value when it is
    /// an object; otherwise stringifies the value. Never throws back into the
    /// caller: any failure while reading properties degrades to the display
    /// form of the original error.
    #[must_use]
    pub fn from_js(error: &JsError, context: &mut Context) -> Self {
        let display = error.to_string();
        let value = error.to_opaque(context);

        let mut kind = None;
        let mut message = None;
        let mut traceback = Vec::new();

        if let Some(obj) = value.as_object() {
            let obj = obj.clone();
            if let Ok(name) = obj.get(js_string!("name"), context) {
                if let Some(s) = name.as_string() {
                    kind = Some(s.to_std_string_escaped());
                }
            }
            if let Ok(msg) = obj.get(js_string!("message"), context) {
                if let Some(s) = msg.as_string() {
                    message = Some(s.to_std_string_escaped());
                }
            }
            if let Ok(stack) = obj.get(js_string!("stack"), context) {
                if let Some(s) = stack.as_string() {
                    traceback = s
                        .to_std_string_escaped()
                        .lines()
                        .skip(1)
                        .map(|line| line.trim().to_owned())
                        .filter(|line| !line.is_empty())
                        .collect();
                }
            }
        }

        // Parse errors carry no name/message properties; split the display
        // string on the conventional "Kind: message" form instead.
        let (kind, message) = match (kind, message) {
            (Some(k), Some(m)) => (k, m),
            (Some(k), None) => (k, String::new()),
            _ => match display.split_once(": ") {
                Some((k, m)) if k.chars().all(|c| c.is_ascii_alphanumeric()) => (k.to_owned(), m.to_owned()),
                _ => ("Error".to_owned(), display.clone()),
            },
        };

        let (line, column) = parse_position(&display, &message);

        Self {
            kind,
            message,
            traceback,
            line,
            column,
        }
    }

    /// True when this error reports a parse failure rather than a runtime
    /// throw.
    #[must_use]
    pub fn is_syntax(&self) -> bool {
        self.kind == "SyntaxError"
    }
}

/// True when the engine throw is a parse failure of the evaluated source.
#[must_use]
pub fn is_parse_failure(error: &JsError) -> bool {
    error.to_string().starts_with("SyntaxError")
}

/// Extracts `line N, col M` style coordinates from error text.
fn parse_position(display: &str, message: &str) -> (Option<u32>, Option<u32>) {
    static POSITION: OnceLock<Regex> = OnceLock::new();
    let re = POSITION.get_or_init(|| {
        Regex::new(r"(?i)line:?\s*(\d+)(?:,?\s*col(?:umn)?:?\s*(\d+))?").expect("static pattern compiles")
    });
    for text in [display, message] {
        if let Some(caps) = re.captures(text) {
            let line = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let column = caps.get(2).and_then(|m| m.as_str().parse().ok());
            return (line, column);
        }
    }
    (None, None)
}
