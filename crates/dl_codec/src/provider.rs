//! Collaborator interfaces.
//!
//! The codec owns no storage.  Key material, conversations, drafts and
//! attachment sinks are reached through these traits; `dl_store` ships an
//! in-memory implementation of all of them.  Every call is synchronous and
//! may block.

use std::collections::BTreeSet;

use dl_crypto::{AsymmetricKeyType, PrivateKey, PublicKey};

use crate::address::Address;
use crate::attachments::AttachmentSink;
use crate::error::{BoxError, Result};
use crate::types::{
    Conversation, ConversationId, MessageId, SenderInfo, StoredAttachment, StoredMessage,
};

/// Resolves the local user's private keys by type and id.
pub trait PrivateKeyProvider {
    fn private_key(&self, key_type: AsymmetricKeyType, key_id: u32) -> Result<PrivateKey, BoxError>;
}

/// Resolves other users' public keys.
pub trait PublicKeyLookup {
    fn public_key(
        &self,
        address: &Address,
        key_type: AsymmetricKeyType,
        key_id: u32,
    ) -> Option<PublicKey>;
}

/// Conversations keyed by their participant set.
pub trait ConversationStore {
    fn find_by_participants(&self, participants: &BTreeSet<Address>) -> Option<Conversation>;
    fn create_conversation(&self, participants: BTreeSet<Address>) -> Conversation;
}

/// Everything the encoder reads when building an outgoing message.
pub trait EncoderStore {
    fn conversation(&self, id: ConversationId) -> Option<Conversation>;
    fn draft_attachments(&self, conversation_id: ConversationId) -> Vec<StoredAttachment>;
    fn message(&self, id: MessageId) -> Option<StoredMessage>;
    fn message_sender(&self, message_id: MessageId) -> Option<SenderInfo>;
    fn message_attachments(&self, message_id: MessageId) -> Vec<StoredAttachment>;
}

/// Creates the sink that receives one attachment's plaintext.
pub trait AttachmentStreamFactory {
    fn make_sink(
        &mut self,
        index: u32,
        size: u32,
        hash: &str,
    ) -> Result<Box<dyn AttachmentSink>>;
}

/// Whether `MessageDecoder::decode` checks the content signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifySignature {
    True,
    False,
}

impl From<bool> for VerifySignature {
    fn from(verify: bool) -> Self {
        if verify {
            Self::True
        } else {
            Self::False
        }
    }
}
