use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }
}

/// Body of the single POST sent per session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            stream: false,
        }
    }

    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// Ordered message history for a multi-turn exchange.
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    history: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(prompt: impl Into<String>) -> Self {
        Self {
            history: vec![ChatMessage::system(prompt)],
        }
    }

    pub fn history(&self) -> &[ChatMessage] {
        &self.history
    }

    /// Appends the user turn and returns the request for it.
    pub fn ask(&mut self, content: impl Into<String>, stream: bool) -> ChatRequest {
        self.history.push(ChatMessage::user(content));
        ChatRequest::new(self.history.clone()).streaming(stream)
    }

    pub fn record_reply(&mut self, content: impl Into<String>) {
        self.history.push(ChatMessage::assistant(content));
    }

    /// Drops a trailing user turn that never received a reply.
    pub fn abandon_turn(&mut self) {
        if self.history.last().map(|message| message.role) == Some(Role::User) {
            self.history.pop();
        }
    }

    pub fn clear(&mut self) {
        self.history.retain(|message| message.role == Role::System);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_roles_lowercase() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")]).streaming(true);
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"messages": [{"role": "user", "content": "hi"}], "stream": true})
        );
    }

    #[test]
    fn conversation_keeps_turn_order() {
        let mut conversation = Conversation::with_system("sys");
        let request = conversation.ask("first", true);
        assert_eq!(request.messages.len(), 2);
        conversation.record_reply("answer");
        let request = conversation.ask("second", false);
        let roles: Vec<_> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert!(!request.stream);
        conversation.abandon_turn();
        assert_eq!(conversation.history().len(), 3);
        conversation.abandon_turn();
        assert_eq!(conversation.history().len(), 3);
        conversation.clear();
        assert_eq!(conversation.history().len(), 1);
    }
}
