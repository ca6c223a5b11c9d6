//! Builds the plaintext of outgoing messages from stored drafts and
//! messages.  Stateless; every input comes from the `EncoderStore`.

use chrono::{DateTime, FixedOffset};
use tracing::debug;

use crate::address::Address;
use crate::attachments;
use crate::content::{self, BodyFields};
use crate::delivery::Delivery;
use crate::error::{IntegrityError, Result};
use crate::meta;
use crate::provider::EncoderStore;
use crate::types::{ConversationId, Draft, EncodedMessage, MessageId, SenderInfo, StoredAttachment};

/// Encode a draft for sending from `sender_address`.
pub fn encode_draft(
    sender_address: &Address,
    draft: &Draft,
    date_sent: &DateTime<FixedOffset>,
    store: &dyn EncoderStore,
) -> Result<EncodedMessage> {
    let sender = SenderInfo {
        address: sender_address.clone(),
        name: draft.sender_name.clone(),
        organization: draft.sender_organization.clone(),
        avatar: draft.sender_avatar.clone(),
    };
    let attachments = store.draft_attachments(draft.conversation_id);

    encode(
        draft.conversation_id,
        &sender,
        date_sent,
        &draft.text,
        &draft.footer,
        attachments,
        store,
    )
}

/// Re-encode a message that is already stored.
pub fn encode_stored_message(message_id: MessageId, store: &dyn EncoderStore) -> Result<EncodedMessage> {
    let message = store
        .message(message_id)
        .ok_or(IntegrityError::MissingMessage(message_id))?;
    let sender = store
        .message_sender(message_id)
        .ok_or(IntegrityError::MissingSender(message_id))?;
    let attachments = store.message_attachments(message_id);

    encode(
        message.conversation_id,
        &sender,
        &message.date_sent,
        &message.text,
        &message.footer,
        attachments,
        store,
    )
}

/// Serialize read/done state in the latest meta format.
pub fn encode_meta(read: bool, done: bool, delivery: &[Delivery]) -> Vec<u8> {
    meta::encode(read, done, delivery)
}

fn encode(
    conversation_id: ConversationId,
    sender: &SenderInfo,
    date_sent: &DateTime<FixedOffset>,
    text: &str,
    footer: &str,
    attachments: Vec<StoredAttachment>,
    store: &dyn EncoderStore,
) -> Result<EncodedMessage> {
    let conversation = store
        .conversation(conversation_id)
        .ok_or(IntegrityError::MissingConversation(conversation_id))?;

    let (index, data) = attachments::concat(attachments)?;

    let content = content::encode(BodyFields {
        sender,
        recipients: &conversation.participants,
        date_sent,
        text,
        footer,
        attachments: &index,
    })?;

    debug!(
        conversation_id,
        recipients = conversation.participants.len(),
        attachments = index.len(),
        content_len = content.len(),
        "[encoder] message encoded"
    );

    Ok(EncodedMessage {
        content,
        attachments: data,
    })
}
