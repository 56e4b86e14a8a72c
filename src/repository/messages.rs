//! Customer inquiry queries

use serde_json::{Map, Value};
use validator::Validate;

use super::{Entity, Repository};
use crate::domain::aggregates::ChatMessage;
use crate::store::server_timestamp;
use crate::{FieldErrors, Result, StorefrontError};

impl Entity for ChatMessage {
    const COLLECTION: &'static str = "messages";

    fn id(&self) -> &str { &self.id }
    fn set_id(&mut self, id: String) { self.id = id; }

    /// New inquiries start unread and unanswered.
    fn prepare_new(&mut self) {
        self.read = false;
        self.admin_reply = None;
        self.replied_at = None;
    }

    fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(|errors| StorefrontError::Validation(FieldErrors::from(errors)))
    }

    fn sort(items: &mut [Self]) { items.sort_by(|a, b| b.created_at.cmp(&a.created_at)); }
}

impl Repository<ChatMessage> {
    pub async fn mark_read(&self, id: &str, read: bool) -> Result<()> {
        let mut partial = Map::new();
        partial.insert("read".into(), Value::Bool(read));
        self.update(id, &partial).await
    }

    /// Stores the admin's answer and marks the inquiry read.
    pub async fn reply(&self, id: &str, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Err(StorefrontError::invalid_field("adminReply", "required", "Reply text is required"));
        }
        let mut partial = Map::new();
        partial.insert("adminReply".into(), Value::String(text.trim().to_string()));
        partial.insert("repliedAt".into(), server_timestamp());
        partial.insert("read".into(), Value::Bool(true));
        self.update(id, &partial).await?;
        tracing::info!(message_id = id, "inquiry answered");
        Ok(())
    }

    pub async fn unread_count(&self) -> usize {
        self.get_all().await.iter().filter(|m| !m.read).count()
    }
}
