#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

use dl_codec::error::BoxError;
use dl_codec::provider::{ConversationStore, EncoderStore, PrivateKeyProvider, PublicKeyLookup};
use dl_codec::types::{
    Conversation, ConversationId, MessageId, SenderInfo, StoredAttachment, StoredMessage,
};
use dl_codec::Address;
use dl_crypto::{AsymmetricKeyType, PrivateKey, PublicKey};

pub const ENC_KEY_ID: u32 = 11;
pub const SIG_KEY_ID: u32 = 22;

pub struct Keys {
    pub encryption: PrivateKey,
    pub signature: PrivateKey,
}

/// RSA keys are slow to generate; one pair per test binary.
pub fn keys() -> &'static Keys {
    static KEYS: OnceLock<Keys> = OnceLock::new();
    KEYS.get_or_init(|| Keys {
        encryption: PrivateKey::generate(AsymmetricKeyType::Encryption, 2048).unwrap(),
        signature: PrivateKey::generate(AsymmetricKeyType::Signature, 2048).unwrap(),
    })
}

pub fn addr(s: &str) -> Address {
    Address::parse(s).unwrap()
}

/// The recipient's own key ring.
pub struct OwnKeys;

impl PrivateKeyProvider for OwnKeys {
    fn private_key(&self, key_type: AsymmetricKeyType, key_id: u32) -> Result<PrivateKey, BoxError> {
        match (key_type, key_id) {
            (AsymmetricKeyType::Encryption, ENC_KEY_ID) => Ok(keys().encryption.clone()),
            _ => Err(format!("no {key_type} key {key_id}").into()),
        }
    }
}

/// Directory of other users' signature keys.
pub struct Directory {
    pub owner: Address,
}

impl PublicKeyLookup for Directory {
    fn public_key(&self, address: &Address, key_type: AsymmetricKeyType, key_id: u32) -> Option<PublicKey> {
        (address == &self.owner && key_type == AsymmetricKeyType::Signature && key_id == SIG_KEY_ID)
            .then(|| keys().signature.public_key())
    }
}

#[derive(Default)]
pub struct FakeStore {
    pub conversations: RefCell<Vec<Conversation>>,
    pub draft_attachments: HashMap<ConversationId, Vec<StoredAttachment>>,
    pub messages: HashMap<MessageId, StoredMessage>,
    pub senders: HashMap<MessageId, SenderInfo>,
    pub message_attachments: HashMap<MessageId, Vec<StoredAttachment>>,
}

impl FakeStore {
    pub fn with_conversation(participants: &[&str]) -> (Self, ConversationId) {
        let store = Self::default();
        let conv = store.create_conversation(participants.iter().map(|p| addr(p)).collect());
        (store, conv.id)
    }
}

impl ConversationStore for FakeStore {
    fn find_by_participants(&self, participants: &BTreeSet<Address>) -> Option<Conversation> {
        self.conversations
            .borrow()
            .iter()
            .find(|c| &c.participants == participants)
            .cloned()
    }

    fn create_conversation(&self, participants: BTreeSet<Address>) -> Conversation {
        let mut all = self.conversations.borrow_mut();
        let conversation = Conversation {
            id: all.len() as u64 + 1,
            participants,
        };
        all.push(conversation.clone());
        conversation
    }
}

impl EncoderStore for FakeStore {
    fn conversation(&self, id: ConversationId) -> Option<Conversation> {
        self.conversations.borrow().iter().find(|c| c.id == id).cloned()
    }

    fn draft_attachments(&self, conversation_id: ConversationId) -> Vec<StoredAttachment> {
        self.draft_attachments.get(&conversation_id).cloned().unwrap_or_default()
    }

    fn message(&self, id: MessageId) -> Option<StoredMessage> {
        self.messages.get(&id).cloned()
    }

    fn message_sender(&self, message_id: MessageId) -> Option<SenderInfo> {
        self.senders.get(&message_id).cloned()
    }

    fn message_attachments(&self, message_id: MessageId) -> Vec<StoredAttachment> {
        self.message_attachments.get(&message_id).cloned().unwrap_or_default()
    }
}
