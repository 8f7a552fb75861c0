//! In-memory store of named conversation threads for one session.

use confab_ai::ChatMessage;

use crate::error::StoreError;

/// Name of the chat that always exists and cannot be deleted
pub const DEFAULT_CHAT_NAME: &str = "Default Chat";

/// A named, ordered sequence of messages
#[derive(Debug, Clone)]
pub struct Chat {
    name: String,
    messages: Vec<ChatMessage>,
}

impl Chat {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            messages: Vec::new(),
        }
    }

    /// The chat's name (unique within the store)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Messages in conversational order
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

/// Session-scoped store of named chats.
///
/// Chats keep their creation order for display and export. The active
/// pointer always names an existing chat, and the default chat is always
/// present. The store holds no lock of its own: callers run operations
/// within one request/response cycle at a time.
#[derive(Debug, Clone)]
pub struct ChatStore {
    chats: Vec<Chat>,
    active: String,
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ChatStore {
    /// Create a store holding only the empty default chat
    pub fn new() -> Self {
        Self {
            chats: vec![Chat::new(DEFAULT_CHAT_NAME)],
            active: DEFAULT_CHAT_NAME.to_string(),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.chats.iter().position(|c| c.name == name)
    }

    /// Create an empty chat under `name` and make it active.
    ///
    /// A blank name is rejected. Re-using an existing name replaces that
    /// chat's messages (last writer wins).
    pub fn create_chat(&mut self, name: &str) -> Result<(), StoreError> {
        if name.trim().is_empty() {
            return Err(StoreError::InvalidName);
        }

        match self.position(name) {
            Some(idx) => {
                tracing::warn!(name, "chat name already exists, replacing its messages");
                self.chats[idx].messages.clear();
            }
            None => self.chats.push(Chat::new(name)),
        }
        self.active = name.to_string();
        Ok(())
    }

    /// Remove a chat. The default chat is protected; deleting the active
    /// chat resets the active pointer to the default chat.
    pub fn delete_chat(&mut self, name: &str) -> Result<(), StoreError> {
        let idx = self
            .position(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;
        if name == DEFAULT_CHAT_NAME {
            return Err(StoreError::ProtectedChat);
        }

        self.chats.remove(idx);
        if self.active == name {
            self.active = DEFAULT_CHAT_NAME.to_string();
        }
        Ok(())
    }

    /// Make an existing chat the active one
    pub fn select_chat(&mut self, name: &str) -> Result<(), StoreError> {
        if self.position(name).is_none() {
            return Err(StoreError::NotFound(name.to_string()));
        }
        self.active = name.to_string();
        Ok(())
    }

    /// Empty the active chat's messages, keeping the chat itself
    pub fn clear_active(&mut self) {
        let idx = self.active_index();
        self.chats[idx].messages.clear();
    }

    /// Append a message to the active chat
    pub fn append_to_active(&mut self, message: ChatMessage) {
        let idx = self.active_index();
        self.chats[idx].messages.push(message);
    }

    fn active_index(&self) -> usize {
        // The active pointer always references an existing chat.
        self.position(&self.active)
            .expect("active chat missing from store")
    }

    /// Name of the active chat
    pub fn active_name(&self) -> &str {
        &self.active
    }

    /// Messages of the active chat, in conversational order
    pub fn active_messages(&self) -> &[ChatMessage] {
        &self.chats[self.active_index()].messages
    }

    /// All chats, in creation order
    pub fn chats(&self) -> &[Chat] {
        &self.chats
    }

    /// Chat names, in creation order
    pub fn chat_names(&self) -> Vec<&str> {
        self.chats.iter().map(|c| c.name.as_str()).collect()
    }

    /// Number of chats in the store
    pub fn len(&self) -> usize {
        self.chats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chats.is_empty()
    }

    /// Serialize the whole store as a pretty-printed JSON object mapping
    /// chat name to its ordered `{role, content}` messages.
    ///
    /// Read-only; parsing the result back yields identical chat names and
    /// message order.
    pub fn export_all(&self) -> String {
        let mut map = serde_json::Map::new();
        for chat in &self.chats {
            let messages = serde_json::to_value(&chat.messages)
                .unwrap_or_else(|_| serde_json::Value::Array(vec![]));
            map.insert(chat.name.clone(), messages);
        }
        serde_json::to_string_pretty(&serde_json::Value::Object(map))
            .unwrap_or_else(|_| "{}".to_string())
    }
}
