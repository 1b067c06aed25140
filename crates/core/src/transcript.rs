//! Transcript ownership and index-addressed mutation planning.
//!
//! The transcript mirrors the backend's history store. Index math is
//! validated here, synchronously, before any network call; the HTTP
//! mutations themselves live in the controller.

use crate::error::ClientError;
use crate::message::{Message, Role};

/// Plan for truncating the transcript at an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePlan {
    /// First index removed.
    pub start: usize,
    /// Number of trailing messages removed (`len - start`).
    pub count: usize,
    /// True when the range starts on an assistant reply whose user turn
    /// survives; confirmation wording should point that out.
    pub breaks_exchange: bool,
}

/// Plan for a regeneration: truncate, then resubmit a prompt through the
/// normal send cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegeneratePlan {
    /// Number of trailing messages removed before resubmitting.
    pub remove_count: usize,
    /// Prompt to resubmit.
    pub prompt: String,
}

/// Authoritative in-memory message sequence.
///
/// Messages are addressed by position; every mutation recomputes
/// addressing implicitly because positions are just `Vec` indices.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_messages(messages: Vec<Message>) -> Self {
        Self { messages }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.clone()
    }

    /// Adopt the backend's copy wholesale.
    pub fn replace(&mut self, messages: Vec<Message>) {
        self.messages = messages;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// Record a completed exchange.
    pub fn push_exchange(&mut self, prompt: &str, response: &str) {
        self.messages.push(Message::user(prompt));
        self.messages.push(Message::assistant(response));
    }

    pub fn message(&self, index: usize) -> Result<&Message, ClientError> {
        self.messages.get(index).ok_or(ClientError::InvalidIndex {
            index,
            len: self.messages.len(),
        })
    }

    pub fn set_content(&mut self, index: usize, content: String) -> Result<(), ClientError> {
        let len = self.messages.len();
        let message = self
            .messages
            .get_mut(index)
            .ok_or(ClientError::InvalidIndex { index, len })?;
        message.content = content;
        Ok(())
    }

    /// Drop messages `start..len`, mirroring a backend delete.
    pub fn truncate_from(&mut self, start: usize) {
        self.messages.truncate(start);
    }

    /// Plan removal of all messages from `index` onward. Deletion always
    /// runs to the end so no earlier index ever shifts meaning.
    pub fn delete_plan(&self, index: usize) -> Result<DeletePlan, ClientError> {
        let target = self.message(index)?;
        let breaks_exchange = target.role == Role::Assistant
            && index > 0
            && self.messages[index - 1].role == Role::User;
        Ok(DeletePlan {
            start: index,
            count: self.messages.len() - index,
            breaks_exchange,
        })
    }

    /// Plan a regeneration anchored at `index`.
    ///
    /// An assistant message regenerates from its nearest preceding user
    /// message; a user message resubmits itself when `from_user` allows.
    /// The prompt and everything after it are removed, then the prompt is
    /// resubmitted, which re-appends the pair on success.
    pub fn regenerate_plan(
        &self,
        index: usize,
        from_user: bool,
    ) -> Result<RegeneratePlan, ClientError> {
        let target = self.message(index)?;
        let anchor = match target.role {
            Role::Assistant => self.messages[..index]
                .iter()
                .rposition(|m| m.role == Role::User)
                .ok_or(ClientError::NoPrecedingUser { index })?,
            Role::User => {
                if !from_user {
                    return Err(ClientError::RegenerateFromUserDisabled);
                }
                index
            }
        };
        Ok(RegeneratePlan {
            remove_count: self.messages.len() - anchor,
            prompt: self.messages[anchor].content.clone(),
        })
    }

    /// Plan for continuing a conversation that ends on an unanswered user
    /// message: resubmit that message.
    pub fn continue_plan(&self) -> Result<RegeneratePlan, ClientError> {
        match self.messages.last() {
            Some(message) if message.role == Role::User => Ok(RegeneratePlan {
                remove_count: 1,
                prompt: message.content.clone(),
            }),
            _ => Err(ClientError::NothingToContinue),
        }
    }
}
