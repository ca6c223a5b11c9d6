//! Message records crossing the codec boundary.
//!
//! `WireMessage` is what transport hands in, `DecryptedMessage` what the
//! decryptor hands to the decoder.  On the send side `EncodedMessage` holds
//! the plaintext JSON body and attachment blob, `SendableMessage` their
//! ciphertext.

use std::collections::BTreeSet;

use chrono::{DateTime, FixedOffset};
use dl_crypto::SymmetricKey;

use crate::address::Address;
use crate::compressor::MessageCompressor;
use crate::content::DecryptedContent;
use crate::error::Result;
use crate::keysafe::KeySafe;
use crate::meta::SealedMeta;

pub type MessageId = u64;
pub type ConversationId = u64;

/// A received message exactly as it came off the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WireMessage {
    pub id: MessageId,
    pub last_modified: u64,
    pub date_received: DateTime<FixedOffset>,
    pub key_safe: Vec<u8>,
    pub content: Vec<u8>,
    pub meta: Vec<u8>,
}

/// Output of `MessageDecryptor`: keySafe and content opened, nothing parsed
/// yet beyond the keySafe.  Meta stays sealed until the decoder knows the
/// sender.
#[derive(Debug, Clone)]
pub struct DecryptedMessage {
    pub id: MessageId,
    pub last_modified: u64,
    pub date_received: DateTime<FixedOffset>,
    pub key_safe: KeySafe,
    pub content: DecryptedContent,
    pub meta: SealedMeta,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncodedMessage {
    /// Content JSON.
    pub content: Vec<u8>,
    /// Attachment payloads, concatenated in index order.
    pub attachments: Vec<u8>,
}

impl EncodedMessage {
    /// Compress the content and, when present, the attachments.
    pub fn compress(self, compressor: &dyn MessageCompressor) -> Result<Self> {
        let content = compressor.compress(&self.content)?;
        let attachments = if self.attachments.is_empty() {
            self.attachments
        } else {
            compressor.compress(&self.attachments)?
        };
        Ok(Self { content, attachments })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SendableMessage {
    pub key_safe: Vec<u8>,
    pub content: Vec<u8>,
    pub attachments: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Avatar {
    pub mime_type: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderInfo {
    pub address: Address,
    pub name: String,
    pub organization: String,
    pub avatar: Option<Avatar>,
}

/// One entry of the content's `attachmentsIndex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentMeta {
    /// Position in the index, from 0.
    pub index: u32,
    pub filename: String,
    pub mime_type: String,
    pub note: String,
    pub size: u32,
    /// Hex SHA-512 of the payload.
    pub hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedMessageContent {
    pub sender: SenderInfo,
    /// Everyone taking part except the local user.
    pub participants: BTreeSet<Address>,
    pub date_sent: DateTime<FixedOffset>,
    pub text: String,
    pub footer: String,
    pub attachments: Vec<AttachmentMeta>,
}

/// Persistable message row produced by decoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageRecord {
    pub id: MessageId,
    pub last_modified: u64,
    pub date_received: DateTime<FixedOffset>,
    pub date_sent: DateTime<FixedOffset>,
    pub sender: Address,
    pub text: String,
    pub footer: String,
    pub symm_key: SymmetricKey,
    pub meta_version: u32,
    pub read: bool,
    pub done: bool,
    pub signature_key_id: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    pub participants: BTreeSet<Address>,
}

/// Unsent message as kept by the storage layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Draft {
    pub conversation_id: ConversationId,
    pub sender_name: String,
    pub sender_organization: String,
    pub sender_avatar: Option<Avatar>,
    pub text: String,
    pub footer: String,
}

/// Already stored (sent or received) message, as needed for re-encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub conversation_id: ConversationId,
    pub date_sent: DateTime<FixedOffset>,
    pub text: String,
    pub footer: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAttachment {
    pub meta: AttachmentMeta,
    pub content: Vec<u8>,
}
