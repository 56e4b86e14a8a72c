//! Customer inquiries

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::domain::value_objects::{email_shape, not_blank};

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase", default)]
pub struct ChatMessage {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[validate(custom = "not_blank")]
    pub name: String,
    #[validate(custom = "email_shape")]
    pub email: String,
    #[validate(custom = "not_blank")]
    pub message: String,
    pub created_at: i64,
    pub read: bool,
    pub admin_reply: Option<String>,
    pub replied_at: Option<i64>,
}

impl ChatMessage {
    pub fn new(name: impl Into<String>, email: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), email: email.into(), message: message.into(), ..Default::default() }
    }

    pub fn is_answered(&self) -> bool { self.admin_reply.as_deref().is_some_and(|r| !r.trim().is_empty()) }
}
