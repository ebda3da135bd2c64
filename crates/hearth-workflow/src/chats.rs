use chrono::{DateTime, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use hearth_types::events::ChangeEvent;
use hearth_types::models::{Chat, ChatMessage, Session};

use crate::Workflows;
use crate::error::{WorkflowError, WorkflowResult};
use crate::retry::retry_once;

pub const MAX_CHAT_MESSAGE_LEN: usize = 4000;
pub const DEFAULT_MESSAGE_PAGE: u32 = 50;
pub const MAX_MESSAGE_PAGE: u32 = 200;

impl Workflows {
    /// The chat between the caller and `other`, created on first use.
    pub fn open_chat(&self, session: &Session, other: Uuid) -> WorkflowResult<Chat> {
        if other == session.user_id {
            return Err(WorkflowError::validation("cannot open a chat with yourself"));
        }
        self.require_user(other)?;

        let id = Uuid::new_v4().to_string();
        let (me, them) = (session.user_id.to_string(), other.to_string());
        let (chat, created) = retry_once("open chat", || self.db.open_chat(&id, &me, &them))?;
        if created {
            info!("Chat {} opened between {} and {}", chat.id, session.user_id, other);
        }
        Ok(chat)
    }

    /// The caller's chats, most recent activity first.
    pub fn list_chats(&self, session: &Session) -> WorkflowResult<Vec<Chat>> {
        let uid = session.user_id.to_string();
        retry_once("list chats", || self.db.list_chats_for_user(&uid))
    }

    pub fn send_chat_message(
        &self,
        session: &Session,
        chat_id: Uuid,
        body: &str,
    ) -> WorkflowResult<ChatMessage> {
        let body = body.trim();
        if body.is_empty() {
            return Err(WorkflowError::validation("message is empty"));
        }
        if body.chars().count() > MAX_CHAT_MESSAGE_LEN {
            return Err(WorkflowError::validation(format!(
                "message is longer than {} characters",
                MAX_CHAT_MESSAGE_LEN
            )));
        }
        self.load_chat(session, chat_id)?;

        let id = Uuid::new_v4().to_string();
        let (cid, author) = (chat_id.to_string(), session.user_id.to_string());
        let saved = retry_once("insert chat message", || {
            self.db.insert_chat_message(&id, &cid, &author, body)
        })?;

        debug!("Chat message {} in {} from {}", saved.id, chat_id, saved.author_id);
        self.dispatcher.publish(ChangeEvent::ChatMessageCreated(saved.clone()));
        Ok(saved)
    }

    /// Newest first. Pass the oldest `created_at` of a page as `before` to
    /// get the page preceding it.
    pub fn list_chat_messages(
        &self,
        session: &Session,
        chat_id: Uuid,
        limit: Option<u32>,
        before: Option<DateTime<Utc>>,
    ) -> WorkflowResult<Vec<ChatMessage>> {
        self.load_chat(session, chat_id)?;
        let limit = limit.unwrap_or(DEFAULT_MESSAGE_PAGE).clamp(1, MAX_MESSAGE_PAGE);
        let cid = chat_id.to_string();
        retry_once("list chat messages", || {
            self.db.list_chat_messages(&cid, limit, before)
        })
    }

    /// Outsiders get `NotFound`, same as for a chat that does not exist.
    fn load_chat(&self, session: &Session, chat_id: Uuid) -> WorkflowResult<Chat> {
        let cid = chat_id.to_string();
        retry_once("load chat", || self.db.get_chat(&cid))?
            .filter(|chat| chat.involves(session.user_id))
            .ok_or_else(|| WorkflowError::NotFound(format!("chat {}", chat_id)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use hearth_db::Database;
    use hearth_gateway::Dispatcher;
    use hearth_types::events::SubscriptionFilter;

    use super::*;

    fn setup() -> (Workflows, Session, Session) {
        let db = Database::open_in_memory().unwrap();
        let tenant = Session::new(Uuid::new_v4(), "Mara");
        let owner = Session::new(Uuid::new_v4(), "Teodor");
        for s in [&tenant, &owner] {
            db.create_user(&s.user_id.to_string(), &s.display_name, &s.display_name, "x")
                .unwrap();
        }
        (Workflows::new(Arc::new(db), Dispatcher::new()), tenant, owner)
    }

    #[test]
    fn either_side_reaches_the_same_chat() {
        let (wf, tenant, owner) = setup();
        let chat = wf.open_chat(&tenant, owner.user_id).unwrap();
        assert!(chat.involves(tenant.user_id) && chat.involves(owner.user_id));
        assert_eq!(wf.open_chat(&owner, tenant.user_id).unwrap().id, chat.id);

        assert!(matches!(
            wf.open_chat(&tenant, tenant.user_id),
            Err(WorkflowError::Validation(_))
        ));
        assert!(matches!(
            wf.open_chat(&tenant, Uuid::new_v4()),
            Err(WorkflowError::NotFound(_))
        ));
    }

    #[test]
    fn messages_reach_the_other_participant_only() {
        let (wf, tenant, owner) = setup();
        let chat = wf.open_chat(&tenant, owner.user_id).unwrap();
        let mut inbox = wf
            .dispatcher()
            .subscribe(SubscriptionFilter::ChatMessagesFor(owner.user_id));

        let sent = wf
            .send_chat_message(&tenant, chat.id, "  Is the flat still free?  ")
            .unwrap();
        assert_eq!(sent.body, "Is the flat still free?");
        assert_eq!(sent.recipient_id, owner.user_id);
        assert_eq!(sent.author_display_name, "Mara");
        match inbox.try_next() {
            Some(ChangeEvent::ChatMessageCreated(m)) => assert_eq!(m.id, sent.id),
            other => panic!("expected chat message, got {:?}", other),
        }

        let history = wf.list_chat_messages(&owner, chat.id, None, None).unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(wf.list_chats(&owner).unwrap()[0].id, chat.id);
    }

    #[test]
    fn outsiders_cannot_read_or_write() {
        let (wf, tenant, owner) = setup();
        let chat = wf.open_chat(&tenant, owner.user_id).unwrap();
        let stranger = Session::new(Uuid::new_v4(), "Stranger");

        assert!(matches!(
            wf.send_chat_message(&stranger, chat.id, "hello"),
            Err(WorkflowError::NotFound(_))
        ));
        assert!(matches!(
            wf.list_chat_messages(&stranger, chat.id, None, None),
            Err(WorkflowError::NotFound(_))
        ));
        assert!(matches!(
            wf.send_chat_message(&tenant, chat.id, "   "),
            Err(WorkflowError::Validation(_))
        ));
    }
}
