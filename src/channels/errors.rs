use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::telemetry::{FormatterMode, PlainFormatter, TelemetryFormatter};

/// A recoverable error recorded on the errors channel.
///
/// Error events capture failures that were handled locally (a tool call that
/// errored, a branch that hit its iteration cap, a provider retry that ran
/// out) without aborting the cycle. They accumulate on the state's errors
/// channel and are persisted with it.
///
/// # Examples
///
/// ```
/// use tickerflow::channels::errors::{ErrorEvent, Fault};
/// use serde_json::json;
///
/// let event = ErrorEvent::branch("fundamental", 2, Fault::msg("news lookup failed"))
///     .with_tag("tool")
///     .with_context(json!({"tool": "get_stock_news"}));
/// assert_eq!(event.tags, vec!["tool"]);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct ErrorEvent {
    #[serde(default = "chrono::Utc::now")]
    pub when: DateTime<Utc>,
    #[serde(default)]
    pub scope: ErrorScope,
    #[serde(default)]
    pub error: Fault,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub context: serde_json::Value,
}

impl ErrorEvent {
    /// Create a branch-scoped error event (one specialist path of a cycle).
    pub fn branch<S: Into<String>>(branch: S, step: u64, error: Fault) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Branch {
                branch: branch.into(),
                step,
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create a scheduler-scoped error event (fan-out/join machinery).
    pub fn scheduler(step: u64, error: Fault) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Scheduler { step },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create a session-scoped error event (turn orchestration).
    pub fn session<S: Into<String>>(session: S, step: u64, error: Fault) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::Session {
                session: session.into(),
                step,
            },
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Create an app-scoped error event.
    pub fn app(error: Fault) -> Self {
        Self {
            when: Utc::now(),
            scope: ErrorScope::App,
            error,
            tags: Vec::new(),
            context: serde_json::Value::Null,
        }
    }

    /// Add a single tag to this error event.
    pub fn with_tag<S: Into<String>>(mut self, tag: S) -> Self {
        self.tags.push(tag.into());
        self
    }

    /// Add context metadata to this error event.
    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = context;
        self
    }
}

/// Where in the pipeline an error event originated.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "scope", rename_all = "snake_case")]
pub enum ErrorScope {
    Branch {
        branch: String,
        step: u64,
    },
    Scheduler {
        step: u64,
    },
    Session {
        session: String,
        step: u64,
    },
    #[default]
    App,
}

/// Structured error detail with an optional cause chain.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Fault {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cause: Option<Box<Fault>>,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl Default for Fault {
    fn default() -> Self {
        Fault {
            message: String::new(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }
}

impl std::fmt::Display for Fault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.cause.as_ref().map(|c| c as &dyn std::error::Error)
    }
}

impl Fault {
    pub fn msg<M: Into<String>>(m: M) -> Self {
        Fault {
            message: m.into(),
            cause: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn with_cause(mut self, cause: Fault) -> Self {
        self.cause = Some(Box::new(cause));
        self
    }
}

/// Format error events as human-readable text with explicit color mode.
pub fn pretty_print_with_mode(events: &[ErrorEvent], mode: FormatterMode) -> String {
    let formatter = PlainFormatter::with_mode(mode);
    let renders = formatter.render_errors(events);
    let mut out = String::new();
    for (idx, render) in renders.into_iter().enumerate() {
        if idx > 0 {
            out.push('\n');
        }
        for line in render.lines {
            out.push_str(&line);
        }
    }
    out
}

/// Format error events as human-readable text with auto-detected color support.
pub fn pretty_print(events: &[ErrorEvent]) -> String {
    pretty_print_with_mode(events, FormatterMode::Auto)
}
