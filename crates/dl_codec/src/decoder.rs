//! Turns a `DecryptedMessage` into persistable records.
//!
//! The decoder is a typed state machine; each step consumes the previous
//! state, so the call order is checked by the compiler:
//!
//!   MessageDecoder  --decode()-->  DecodedMessage  --make_conversation()-->  MaterializedMessage

use std::collections::BTreeSet;

use tracing::{debug, info};

use crate::address::Address;
use crate::compressor::MessageCompressor;
use crate::content;
use crate::delivery::Delivery;
use crate::error::Result;
use crate::meta::MessageMetaState;
use crate::provider::{ConversationStore, PublicKeyLookup, VerifySignature};
use crate::types::{AttachmentMeta, Conversation, DecryptedMessage, MessageRecord, SenderInfo};

pub struct MessageDecoder<'a> {
    message: DecryptedMessage,
    user_address: Address,
    compressor: &'a dyn MessageCompressor,
    public_keys: &'a dyn PublicKeyLookup,
}

impl<'a> MessageDecoder<'a> {
    pub fn new(
        message: DecryptedMessage,
        user_address: Address,
        compressor: &'a dyn MessageCompressor,
        public_keys: &'a dyn PublicKeyLookup,
    ) -> Self {
        Self {
            message,
            user_address,
            compressor,
            public_keys,
        }
    }

    /// Parse the content, optionally verify its signature, then apply meta.
    /// Meta of a message the user sent is never decrypted.
    pub fn decode(self, verify: VerifySignature) -> Result<DecodedMessage> {
        let msg = self.message;

        let body = self.compressor.decompress(&msg.content.data)?;
        let parsed = content::parse(&body, &self.user_address)?;

        if verify == VerifySignature::True {
            content::verify(&msg.content, &parsed.sender.address, self.public_keys)?;
        }

        let state = if parsed.sender.address == self.user_address {
            MessageMetaState::self_sent()
        } else {
            msg.meta.open()?
        };

        debug!(
            id = msg.id,
            meta_version = state.version,
            read = state.read,
            done = state.done,
            "[decoder] decoded"
        );

        let record = MessageRecord {
            id: msg.id,
            last_modified: msg.last_modified,
            date_received: msg.date_received,
            date_sent: parsed.date_sent,
            sender: parsed.sender.address.clone(),
            text: parsed.text,
            footer: parsed.footer,
            symm_key: msg.key_safe.symm_key,
            meta_version: state.version,
            read: state.read,
            done: state.done,
            signature_key_id: msg.content.sig_key_id,
        };

        Ok(DecodedMessage {
            record,
            sender: parsed.sender,
            participants: parsed.participants,
            attachments: parsed.attachments,
            delivery: state.delivery,
        })
    }
}

/// Content and meta decoded, conversation not yet resolved.
#[derive(Debug, Clone)]
pub struct DecodedMessage {
    record: MessageRecord,
    sender: SenderInfo,
    participants: BTreeSet<Address>,
    attachments: Vec<AttachmentMeta>,
    delivery: Vec<Delivery>,
}

impl DecodedMessage {
    pub fn message(&self) -> &MessageRecord {
        &self.record
    }

    pub fn sender(&self) -> &SenderInfo {
        &self.sender
    }

    pub fn attachments(&self) -> &[AttachmentMeta] {
        &self.attachments
    }

    pub fn delivery(&self) -> &[Delivery] {
        &self.delivery
    }

    pub fn signature_key_id(&self) -> u32 {
        self.record.signature_key_id
    }

    /// Sorted participants, without the local user.
    pub fn participants(&self) -> &BTreeSet<Address> {
        &self.participants
    }

    /// Find the conversation with exactly these participants, or create it.
    pub fn make_conversation(self, store: &dyn ConversationStore) -> MaterializedMessage {
        let conversation = match store.find_by_participants(&self.participants) {
            Some(existing) => existing,
            None => {
                let created = store.create_conversation(self.participants.clone());
                info!(
                    conversation_id = created.id,
                    participants = created.participants.len(),
                    "[decoder] created conversation"
                );
                created
            }
        };
        MaterializedMessage {
            decoded: self,
            conversation,
        }
    }
}

/// Fully decoded message with its conversation.
#[derive(Debug, Clone)]
pub struct MaterializedMessage {
    decoded: DecodedMessage,
    conversation: Conversation,
}

impl MaterializedMessage {
    pub fn message(&self) -> &MessageRecord {
        self.decoded.message()
    }

    pub fn sender(&self) -> &SenderInfo {
        self.decoded.sender()
    }

    pub fn attachments(&self) -> &[AttachmentMeta] {
        self.decoded.attachments()
    }

    pub fn delivery(&self) -> &[Delivery] {
        self.decoded.delivery()
    }

    pub fn signature_key_id(&self) -> u32 {
        self.decoded.signature_key_id()
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn into_parts(self) -> (MessageRecord, SenderInfo, Vec<AttachmentMeta>, Conversation) {
        let DecodedMessage {
            record,
            sender,
            attachments,
            ..
        } = self.decoded;
        (record, sender, attachments, self.conversation)
    }
}
