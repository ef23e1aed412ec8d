//! Deterministic completer for tests and dry runs.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::Mutex;

use crate::error::CompletionError;
use crate::llm::{CompletionRequest, TextCompleter};
use crate::prompt;

type Responder = dyn Fn(&CompletionRequest) -> Result<String, CompletionError> + Send + Sync;

/// Answers every request from a closure and remembers what it was asked.
pub struct StubCompleter {
    responder: Box<Responder>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl StubCompleter {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, CompletionError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Replies with the text following the prompt's payload marker.
    pub fn echo_payload() -> Self {
        Self::new(|request| Ok(prompt::payload(&request.user_prompt).to_string()))
    }

    /// Replies with each scripted outcome in turn; an exhausted script
    /// answers with an empty string.
    pub fn scripted(outcomes: Vec<Result<String, CompletionError>>) -> Self {
        let queue = Mutex::new(VecDeque::from(outcomes));
        Self::new(move |_| {
            queue
                .lock()
                .map_err(|_| CompletionError::Transport {
                    service: "stub",
                    message: "script lock poisoned".to_string(),
                })?
                .pop_front()
                .unwrap_or_else(|| Ok(String::new()))
        })
    }

    /// Fails every call with a transport error carrying `message`.
    pub fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_| {
            Err(CompletionError::Transport {
                service: "stub",
                message: message.clone(),
            })
        })
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests
            .lock()
            .map(|requests| requests.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

impl TextCompleter for StubCompleter {
    fn complete(
        &self,
        request: &CompletionRequest,
    ) -> impl Future<Output = Result<String, CompletionError>> + Send {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let outcome = (self.responder)(request);
        async move { outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(user_prompt: &str) -> CompletionRequest {
        CompletionRequest::new("sys".to_string(), user_prompt.to_string(), 100)
    }

    #[tokio::test]
    async fn test_scripted_then_exhausted() {
        let stub = StubCompleter::scripted(vec![
            Ok("first".to_string()),
            Err(CompletionError::Empty { service: "stub" }),
        ]);

        assert_eq!(stub.complete(&request("a")).await.unwrap(), "first");
        assert!(stub.complete(&request("b")).await.is_err());
        assert_eq!(stub.complete(&request("c")).await.unwrap(), "");
        assert_eq!(stub.call_count(), 3);
        assert_eq!(stub.requests()[1].user_prompt, "b");
    }

    #[tokio::test]
    async fn test_echo_payload() {
        let stub = StubCompleter::echo_payload();
        let reply = stub
            .complete(&request("rules\n\nTEXT TO ANALYZE:\nEthanol $ 64-17-5"))
            .await
            .unwrap();
        assert_eq!(reply, "Ethanol $ 64-17-5");
    }

    #[tokio::test]
    async fn test_failing() {
        let stub = StubCompleter::failing("boom");
        let err = stub.complete(&request("a")).await.unwrap_err();
        assert_eq!(err.to_string(), "request to stub failed: boom");
    }
}
