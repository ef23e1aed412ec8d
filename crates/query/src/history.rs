use serde::Serialize;

pub const GREETING: &str = "Hi, how can I help you with the chemical graph?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Conversation shown to a chat user, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct ChatHistory {
    turns: Vec<ChatTurn>,
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self {
            turns: vec![ChatTurn {
                role: Role::Assistant,
                content: GREETING.to_string(),
            }],
        }
    }
}

impl ChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.turns.push(ChatTurn {
            role: Role::User,
            content: content.into(),
        });
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.turns.push(ChatTurn {
            role: Role::Assistant,
            content: content.into(),
        });
    }

    /// Record a question and whatever came back. Errors are shown as the
    /// assistant's reply, unchanged.
    pub fn record_exchange<T, E>(&mut self, question: &str, outcome: &Result<T, E>)
    where
        T: AsRef<str>,
        E: std::fmt::Display,
    {
        self.push_user(question);
        match outcome {
            Ok(answer) => self.push_assistant(answer.as_ref()),
            Err(e) => self.push_assistant(format!("{:#}", e)),
        }
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
