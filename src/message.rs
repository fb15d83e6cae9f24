use serde::{Deserialize, Serialize};
use std::fmt;

/// A single conversation turn: a role plus text content.
///
/// Messages are the unit of conversation history shared between the pipeline
/// stages and the inference interface. Roles are stored as strings so that
/// provider-specific roles round-trip through persistence unchanged; the
/// [`Role`] enum covers the roles this crate produces itself.
///
/// # Examples
///
/// ```
/// use tickerflow::message::Message;
///
/// let user = Message::user("What's the price of NVDA?");
/// let reply = Message::assistant("NVDA is trading at $875.32.");
///
/// assert!(user.has_role(Message::USER));
/// assert!(reply.has_role(Message::ASSISTANT));
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender (e.g. "user", "assistant", "tool").
    pub role: String,
    /// The text content of the message.
    pub content: String,
}

/// Roles produced by this crate's own pipeline stages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
    System,
    /// Result of a tool execution inside an agent loop.
    Tool,
}

impl Role {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => Message::USER,
            Role::Assistant => Message::ASSISTANT,
            Role::System => Message::SYSTEM,
            Role::Tool => Message::TOOL,
        }
    }
}

impl From<&str> for Role {
    fn from(s: &str) -> Self {
        match s {
            Message::ASSISTANT => Role::Assistant,
            Message::SYSTEM => Role::System,
            Message::TOOL => Role::Tool,
            _ => Role::User,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Message {
    /// User input message role.
    pub const USER: &'static str = "user";
    /// Assistant response message role.
    pub const ASSISTANT: &'static str = "assistant";
    /// System instruction message role.
    pub const SYSTEM: &'static str = "system";
    /// Tool result message role.
    pub const TOOL: &'static str = "tool";

    /// Creates a new message with the specified role and content.
    #[must_use]
    pub fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: content.to_string(),
        }
    }

    /// Creates a message from a [`Role`].
    #[must_use]
    pub fn with_role(role: Role, content: &str) -> Self {
        Self::new(role.as_str(), content)
    }

    /// Creates a user message.
    #[must_use]
    pub fn user(content: &str) -> Self {
        Self::new(Self::USER, content)
    }

    /// Creates an assistant message.
    #[must_use]
    pub fn assistant(content: &str) -> Self {
        Self::new(Self::ASSISTANT, content)
    }

    /// Creates a system message.
    #[must_use]
    pub fn system(content: &str) -> Self {
        Self::new(Self::SYSTEM, content)
    }

    /// Creates a tool-result message.
    #[must_use]
    pub fn tool(content: &str) -> Self {
        Self::new(Self::TOOL, content)
    }

    /// Returns true if this message has the specified role.
    #[must_use]
    pub fn has_role(&self, role: &str) -> bool {
        self.role == role
    }
}
