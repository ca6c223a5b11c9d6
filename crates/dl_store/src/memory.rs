//! In-memory storage behind every codec collaborator trait.
//!
//! Handles are cheap to clone and share one state.  Avatars are
//! de-duplicated by the 8-byte hash of their image data, the way the
//! relational store keys its avatar table.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset};
use dl_codec::attachments::{AttachmentSink, HashVerifyingSink};
use dl_codec::error::{BoxError, IntegrityError, Result as CodecResult};
use dl_codec::provider::{
    AttachmentStreamFactory, ConversationStore, EncoderStore, PrivateKeyProvider, PublicKeyLookup,
};
use dl_codec::types::{
    AttachmentMeta, Avatar, Conversation, ConversationId, Draft, MessageId, MessageRecord,
    SenderInfo, StoredAttachment, StoredMessage,
};
use dl_codec::{Address, MaterializedMessage};
use dl_crypto::hash::{eight_byte_hash, sha512_hex};
use dl_crypto::{AsymmetricKeyType, PrivateKey, PublicKey};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::StoreError;

#[derive(Debug, Clone)]
struct SenderRow {
    address: Address,
    name: String,
    organization: String,
    avatar_id: Option<i64>,
}

#[derive(Debug, Clone)]
struct MessageRow {
    message: StoredMessage,
    sender: SenderRow,
    /// Set for received messages only.
    received: Option<MessageRecord>,
}

#[derive(Default)]
struct State {
    private_keys: HashMap<(AsymmetricKeyType, u32), PrivateKey>,
    public_keys: HashMap<(Address, AsymmetricKeyType, u32), PublicKey>,
    conversations: BTreeMap<ConversationId, Conversation>,
    drafts: HashMap<ConversationId, Draft>,
    draft_attachments: HashMap<ConversationId, Vec<StoredAttachment>>,
    messages: BTreeMap<MessageId, MessageRow>,
    attachments: HashMap<MessageId, Vec<StoredAttachment>>,
    avatars: HashMap<i64, Avatar>,
}

impl State {
    fn store_avatar(&mut self, avatar: Option<Avatar>) -> Option<i64> {
        let avatar = avatar?;
        let id = eight_byte_hash(&avatar.data);
        self.avatars.entry(id).or_insert(avatar);
        Some(id)
    }

    fn sender_info(&self, row: &SenderRow) -> SenderInfo {
        SenderInfo {
            address: row.address.clone(),
            name: row.name.clone(),
            organization: row.organization.clone(),
            avatar: row.avatar_id.and_then(|id| self.avatars.get(&id).cloned()),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<State>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Keys ─────────────────────────────────────────────────────────────────

    /// Register one of the local user's private keys.
    pub fn add_private_key(&self, key_id: u32, key: PrivateKey) -> Result<(), StoreError> {
        let key_type = key.key_type();
        let mut state = self.state.lock();
        if state.private_keys.contains_key(&(key_type, key_id)) {
            return Err(StoreError::KeyConflict { key_type, key_id });
        }
        state.private_keys.insert((key_type, key_id), key);
        Ok(())
    }

    /// Register a contact's public key.  Re-adding the same key is a no-op;
    /// a different key under a known id is refused.
    pub fn add_public_key(&self, address: Address, key_id: u32, key: PublicKey) -> Result<(), StoreError> {
        let key_type = key.key_type();
        let mut state = self.state.lock();
        match state.public_keys.get(&(address.clone(), key_type, key_id)) {
            Some(existing) if existing == &key => Ok(()),
            Some(_) => Err(StoreError::KeyConflict { key_type, key_id }),
            None => {
                state.public_keys.insert((address, key_type, key_id), key);
                Ok(())
            }
        }
    }

    // ── Drafts ───────────────────────────────────────────────────────────────

    pub fn save_draft(&self, draft: Draft) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if !state.conversations.contains_key(&draft.conversation_id) {
            return Err(StoreError::NotFound(format!("conversation {}", draft.conversation_id)));
        }
        state.drafts.insert(draft.conversation_id, draft);
        Ok(())
    }

    pub fn draft(&self, conversation_id: ConversationId) -> Option<Draft> {
        self.state.lock().drafts.get(&conversation_id).cloned()
    }

    /// Attach a file to the conversation's draft; index, size and hash are
    /// derived from the content.
    pub fn add_draft_attachment(
        &self,
        conversation_id: ConversationId,
        filename: &str,
        mime_type: &str,
        note: &str,
        content: Vec<u8>,
    ) -> Result<AttachmentMeta, StoreError> {
        let size = u32::try_from(content.len()).map_err(|_| StoreError::AttachmentTooLarge(content.len()))?;
        let mut state = self.state.lock();
        let list = state.draft_attachments.entry(conversation_id).or_default();
        let meta = AttachmentMeta {
            index: list.len() as u32,
            filename: filename.to_owned(),
            mime_type: mime_type.to_owned(),
            note: note.to_owned(),
            size,
            hash: sha512_hex(&content),
        };
        list.push(StoredAttachment {
            meta: meta.clone(),
            content,
        });
        Ok(meta)
    }

    /// Turn the conversation's draft into a sent message.  The draft and its
    /// attachments move over to the new message.
    pub fn commit_draft(
        &self,
        conversation_id: ConversationId,
        sender_address: &Address,
        date_sent: DateTime<FixedOffset>,
    ) -> Result<MessageId, StoreError> {
        let mut state = self.state.lock();
        let draft = state
            .drafts
            .remove(&conversation_id)
            .ok_or_else(|| StoreError::NotFound(format!("draft of conversation {conversation_id}")))?;
        let attachments = state.draft_attachments.remove(&conversation_id).unwrap_or_default();
        let id = state.messages.keys().next_back().map_or(1, |last| last + 1);

        let avatar_id = state.store_avatar(draft.sender_avatar);
        state.messages.insert(
            id,
            MessageRow {
                message: StoredMessage {
                    id,
                    conversation_id,
                    date_sent,
                    text: draft.text,
                    footer: draft.footer,
                },
                sender: SenderRow {
                    address: sender_address.clone(),
                    name: draft.sender_name,
                    organization: draft.sender_organization,
                    avatar_id,
                },
                received: None,
            },
        );
        state.attachments.insert(id, attachments);
        info!(message_id = id, conversation_id, "[store] draft committed");
        Ok(id)
    }

    // ── Received messages ────────────────────────────────────────────────────

    /// Persist a decoded message.  Attachment payloads start out empty and
    /// are filled by the sinks of `attachment_factory`.
    pub fn save_message(&self, message: MaterializedMessage) -> MessageId {
        let (record, sender, attachments, conversation) = message.into_parts();
        let id = record.id;
        let mut state = self.state.lock();

        state
            .conversations
            .entry(conversation.id)
            .or_insert_with(|| conversation.clone());
        let avatar_id = state.store_avatar(sender.avatar);
        let attachments = attachments
            .into_iter()
            .map(|meta| StoredAttachment {
                meta,
                content: Vec::new(),
            })
            .collect();

        state.messages.insert(
            id,
            MessageRow {
                message: StoredMessage {
                    id,
                    conversation_id: conversation.id,
                    date_sent: record.date_sent,
                    text: record.text.clone(),
                    footer: record.footer.clone(),
                },
                sender: SenderRow {
                    address: sender.address,
                    name: sender.name,
                    organization: sender.organization,
                    avatar_id,
                },
                received: Some(record),
            },
        );
        state.attachments.insert(id, attachments);
        info!(message_id = id, conversation_id = conversation.id, "[store] message saved");
        id
    }

    pub fn message_record(&self, id: MessageId) -> Option<MessageRecord> {
        self.state.lock().messages.get(&id).and_then(|row| row.received.clone())
    }

    pub fn set_flags(&self, id: MessageId, read: bool, done: bool) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        let record = state
            .messages
            .get_mut(&id)
            .and_then(|row| row.received.as_mut())
            .ok_or_else(|| StoreError::NotFound(format!("received message {id}")))?;
        record.read = read;
        record.done = done;
        Ok(())
    }

    pub fn attachment_content(&self, message_id: MessageId, index: u32) -> Option<Vec<u8>> {
        self.state
            .lock()
            .attachments
            .get(&message_id)?
            .iter()
            .find(|a| a.meta.index == index)
            .map(|a| a.content.clone())
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state.lock().conversations.values().cloned().collect()
    }

    pub fn avatar_count(&self) -> usize {
        self.state.lock().avatars.len()
    }

    /// Sinks writing the attachments of `message_id` into this store.
    pub fn attachment_factory(&self, message_id: MessageId) -> MemoryAttachmentFactory {
        MemoryAttachmentFactory {
            state: Arc::clone(&self.state),
            message_id,
        }
    }
}

// ── Collaborator traits ───────────────────────────────────────────────────────

impl PrivateKeyProvider for MemoryStore {
    fn private_key(&self, key_type: AsymmetricKeyType, key_id: u32) -> Result<PrivateKey, BoxError> {
        self.state
            .lock()
            .private_keys
            .get(&(key_type, key_id))
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("{key_type} key {key_id}")).into())
    }
}

impl PublicKeyLookup for MemoryStore {
    fn public_key(&self, address: &Address, key_type: AsymmetricKeyType, key_id: u32) -> Option<PublicKey> {
        self.state
            .lock()
            .public_keys
            .get(&(address.clone(), key_type, key_id))
            .cloned()
    }
}

impl ConversationStore for MemoryStore {
    fn find_by_participants(&self, participants: &BTreeSet<Address>) -> Option<Conversation> {
        self.state
            .lock()
            .conversations
            .values()
            .find(|c| &c.participants == participants)
            .cloned()
    }

    fn create_conversation(&self, participants: BTreeSet<Address>) -> Conversation {
        let mut state = self.state.lock();
        let id = state.conversations.keys().next_back().map_or(1, |last| last + 1);
        let conversation = Conversation { id, participants };
        state.conversations.insert(id, conversation.clone());
        debug!(conversation_id = id, "[store] conversation created");
        conversation
    }
}

impl EncoderStore for MemoryStore {
    fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.state.lock().conversations.get(&id).cloned()
    }

    fn draft_attachments(&self, conversation_id: ConversationId) -> Vec<StoredAttachment> {
        self.state
            .lock()
            .draft_attachments
            .get(&conversation_id)
            .cloned()
            .unwrap_or_default()
    }

    fn message(&self, id: MessageId) -> Option<StoredMessage> {
        self.state.lock().messages.get(&id).map(|row| row.message.clone())
    }

    fn message_sender(&self, message_id: MessageId) -> Option<SenderInfo> {
        let state = self.state.lock();
        let row = state.messages.get(&message_id)?;
        Some(state.sender_info(&row.sender))
    }

    fn message_attachments(&self, message_id: MessageId) -> Vec<StoredAttachment> {
        self.state
            .lock()
            .attachments
            .get(&message_id)
            .cloned()
            .unwrap_or_default()
    }
}

// ── Attachment sinks ──────────────────────────────────────────────────────────

/// Hands out hash-checked sinks that land in the owning `MemoryStore`.
pub struct MemoryAttachmentFactory {
    state: Arc<Mutex<State>>,
    message_id: MessageId,
}

impl AttachmentStreamFactory for MemoryAttachmentFactory {
    fn make_sink(&mut self, index: u32, size: u32, hash: &str) -> CodecResult<Box<dyn AttachmentSink>> {
        let sink = MemoryAttachmentSink {
            state: Arc::clone(&self.state),
            message_id: self.message_id,
            index,
            buffer: Vec::with_capacity(size as usize),
        };
        Ok(Box::new(HashVerifyingSink::new(index, hash, Box::new(sink))))
    }
}

struct MemoryAttachmentSink {
    state: Arc<Mutex<State>>,
    message_id: MessageId,
    index: u32,
    buffer: Vec<u8>,
}

impl AttachmentSink for MemoryAttachmentSink {
    fn write(&mut self, data: &[u8]) -> CodecResult<()> {
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    fn close(&mut self) -> CodecResult<()> {
        let mut state = self.state.lock();
        let slot = state
            .attachments
            .get_mut(&self.message_id)
            .and_then(|list| list.iter_mut().find(|a| a.meta.index == self.index))
            .ok_or(IntegrityError::MissingMessage(self.message_id))?;
        slot.content = std::mem::take(&mut self.buffer);
        debug!(
            message_id = self.message_id,
            index = self.index,
            len = slot.content.len(),
            "[store] attachment stored"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn participants(list: &[&str]) -> BTreeSet<Address> {
        list.iter().map(|a| addr(a)).collect()
    }

    fn date() -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339("2024-03-01T12:00:00Z").unwrap()
    }

    fn draft(conversation_id: ConversationId, avatar: &[u8]) -> Draft {
        Draft {
            conversation_id,
            sender_name: "Alice".into(),
            sender_organization: String::new(),
            sender_avatar: Some(Avatar {
                mime_type: "image/png".into(),
                data: avatar.to_vec(),
            }),
            text: "hi".into(),
            footer: String::new(),
        }
    }

    #[test]
    fn conversations_are_found_by_exact_participant_set() {
        let store = MemoryStore::new();
        let a = store.create_conversation(participants(&["bob#x.org"]));
        let b = store.create_conversation(participants(&["bob#x.org", "carol#x.org"]));
        assert_ne!(a.id, b.id);

        let found = store
            .find_by_participants(&participants(&["carol#x.org", "bob#x.org"]))
            .unwrap();
        assert_eq!(found.id, b.id);
        assert!(store.find_by_participants(&participants(&["carol#x.org"])).is_none());
    }

    #[test]
    fn draft_attachments_get_sequential_indices_and_hashes() {
        let store = MemoryStore::new();
        let conv = store.create_conversation(participants(&["bob#x.org"]));
        let first = store.add_draft_attachment(conv.id, "a", "text/plain", "", b"aaa".to_vec()).unwrap();
        let second = store.add_draft_attachment(conv.id, "b", "text/plain", "n", Vec::new()).unwrap();
        assert_eq!((first.index, first.size), (0, 3));
        assert_eq!((second.index, second.size), (1, 0));
        assert_eq!(first.hash, sha512_hex(b"aaa"));
        assert_eq!(store.draft_attachments(conv.id).len(), 2);
    }

    #[test]
    fn draft_needs_a_conversation() {
        let store = MemoryStore::new();
        assert!(matches!(store.save_draft(draft(9, b"png")), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn committed_drafts_become_reencodable_messages() {
        let store = MemoryStore::new();
        let conv = store.create_conversation(participants(&["bob#x.org"]));
        store.save_draft(draft(conv.id, b"png")).unwrap();
        store.add_draft_attachment(conv.id, "a", "text/plain", "", b"aaa".to_vec()).unwrap();

        let id = store.commit_draft(conv.id, &addr("alice#x.org"), date()).unwrap();
        assert!(store.draft(conv.id).is_none());
        assert!(store.draft_attachments(conv.id).is_empty());

        let message = store.message(id).unwrap();
        assert_eq!(message.text, "hi");
        let sender = store.message_sender(id).unwrap();
        assert_eq!(sender.avatar.unwrap().data, b"png");
        assert_eq!(store.message_attachments(id)[0].content, b"aaa");

        assert!(store.commit_draft(conv.id, &addr("alice#x.org"), date()).is_err());
    }

    #[test]
    fn identical_avatars_are_stored_once() {
        let store = MemoryStore::new();
        let conv = store.create_conversation(participants(&["bob#x.org"]));
        for _ in 0..2 {
            store.save_draft(draft(conv.id, b"same image")).unwrap();
            store.commit_draft(conv.id, &addr("alice#x.org"), date()).unwrap();
        }
        store.save_draft(draft(conv.id, b"other image")).unwrap();
        store.commit_draft(conv.id, &addr("alice#x.org"), date()).unwrap();
        assert_eq!(store.avatar_count(), 2);
    }

    #[test]
    fn missing_private_key_is_reported() {
        let store = MemoryStore::new();
        let err = store.private_key(AsymmetricKeyType::Encryption, 4).unwrap_err();
        assert_eq!(err.to_string(), "Record not found: encryption key 4");
    }

    #[test]
    fn sink_for_unknown_message_fails_on_close() {
        let store = MemoryStore::new();
        let mut factory = store.attachment_factory(42);
        let mut sink = factory.make_sink(0, 0, &sha512_hex(b"")).unwrap();
        let err = sink.close().unwrap_err();
        assert!(matches!(
            err,
            dl_codec::CodecError::Integrity(IntegrityError::MissingMessage(42))
        ));
    }
}
