use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{ChatProvider, CompletionRequest, CompletionResponse, ProviderError};

enum Script {
    /// Pop responses in order; error once the queue runs dry.
    Sequence(VecDeque<Result<CompletionResponse, ProviderError>>),
    /// Return the same response on every call (e.g. a tool call that never
    /// terminates, for iteration-cap tests).
    Always(CompletionResponse),
}

/// Deterministic [`ChatProvider`] for tests and offline runs.
///
/// # Examples
///
/// ```
/// use tickerflow::llm::{CompletionResponse, ScriptedProvider};
///
/// let provider = ScriptedProvider::sequence(vec![
///     CompletionResponse::text("NVDA is trading at $875.32."),
/// ]);
/// ```
pub struct ScriptedProvider {
    script: Mutex<Script>,
    calls: Mutex<usize>,
}

impl ScriptedProvider {
    /// Replies with the given responses in order, erroring when exhausted.
    #[must_use]
    pub fn sequence(responses: Vec<CompletionResponse>) -> Self {
        Self {
            script: Mutex::new(Script::Sequence(responses.into_iter().map(Ok).collect())),
            calls: Mutex::new(0),
        }
    }

    /// Like [`sequence`](Self::sequence) but allows scripting failures.
    #[must_use]
    pub fn outcomes(outcomes: Vec<Result<CompletionResponse, ProviderError>>) -> Self {
        Self {
            script: Mutex::new(Script::Sequence(outcomes.into_iter().collect())),
            calls: Mutex::new(0),
        }
    }

    /// Replies with the same response on every call.
    #[must_use]
    pub fn always(response: CompletionResponse) -> Self {
        Self {
            script: Mutex::new(Script::Always(response)),
            calls: Mutex::new(0),
        }
    }

    /// Number of completed `complete` calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        *self.calls.lock().expect("call counter poisoned")
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn complete(
        &self,
        _request: CompletionRequest,
    ) -> Result<CompletionResponse, ProviderError> {
        let mut calls = self.calls.lock().expect("call counter poisoned");
        *calls += 1;
        let calls_so_far = *calls;
        drop(calls);

        let mut script = self.script.lock().expect("script poisoned");
        match &mut *script {
            Script::Sequence(queue) => queue.pop_front().unwrap_or(Err(
                ProviderError::ScriptExhausted {
                    calls: calls_so_far,
                },
            )),
            Script::Always(response) => Ok(response.clone()),
        }
    }
}
