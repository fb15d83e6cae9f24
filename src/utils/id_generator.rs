use uuid::Uuid;

/// Generates identifiers for sessions and orders.
#[derive(Clone, Copy, Debug, Default)]
pub struct IdGenerator;

impl IdGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Random session identifier, e.g. `session-5f3a…`.
    #[must_use]
    pub fn generate_session_id(&self) -> String {
        format!("session-{}", Uuid::new_v4())
    }

    /// Random order identifier for paper trades.
    #[must_use]
    pub fn generate_order_id(&self) -> String {
        format!("order-{}", Uuid::new_v4())
    }
}
