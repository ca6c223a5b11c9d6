//! Alice and Bob, each with their own `MemoryStore`, exchange a message
//! with attachments through the full codec.

use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset};
use dl_codec::attachments::{AttachmentPipeline, AttachmentSplitter};
use dl_codec::provider::{ConversationStore, EncoderStore};
use dl_codec::types::{Avatar, Draft, MessageId};
use dl_codec::{
    encoder, Address, CodecConfig, CodecError, IntegrityError, MessageDecoder, MessageDecryptor,
    MessageEncryptor, SendableMessage, VerifySignature, WireMessage,
};
use dl_crypto::{AsymmetricKeyType, PrivateKey, SymmetricKey};
use dl_store::{CachingPrivateKeyProvider, MemoryStore};

const BOB_ENC_KEY: u32 = 7;
const ALICE_SIG_KEY: u32 = 3;

struct Keys {
    bob_encryption: PrivateKey,
    alice_signature: PrivateKey,
}

fn keys() -> &'static Keys {
    static KEYS: OnceLock<Keys> = OnceLock::new();
    KEYS.get_or_init(|| Keys {
        bob_encryption: PrivateKey::generate(AsymmetricKeyType::Encryption, 2048).unwrap(),
        alice_signature: PrivateKey::generate(AsymmetricKeyType::Signature, 2048).unwrap(),
    })
}

fn alice() -> Address {
    Address::parse("alice#darklock.net").unwrap()
}

fn bob() -> Address {
    Address::parse("bob#darklock.net").unwrap()
}

fn sent_at() -> DateTime<FixedOffset> {
    DateTime::parse_from_rfc3339("2024-02-29T23:59:59.250+05:30").unwrap()
}

struct Outbox {
    store: MemoryStore,
    sent: SendableMessage,
    sent_id: MessageId,
    plain: dl_codec::EncodedMessage,
}

fn alice_sends(config: &CodecConfig) -> anyhow::Result<Outbox> {
    let store = MemoryStore::new();
    let conv = store.create_conversation([bob()].into_iter().collect());
    store.save_draft(Draft {
        conversation_id: conv.id,
        sender_name: "Alice Liddell".into(),
        sender_organization: "Wonderland".into(),
        sender_avatar: Some(Avatar {
            mime_type: "image/jpeg".into(),
            data: vec![0xFF, 0xD8, 0xFF],
        }),
        text: "See attached.".into(),
        footer: "-- A".into(),
    })?;
    store.add_draft_attachment(conv.id, "notes.txt", "text/plain", "read me", b"down the rabbit hole".to_vec())?;
    store.add_draft_attachment(conv.id, "blank", "application/octet-stream", "", Vec::new())?;
    store.add_draft_attachment(conv.id, "map.bin", "application/octet-stream", "", vec![0x42; 4096])?;

    let draft = store.draft(conv.id).expect("draft saved");
    let plain = encoder::encode_draft(&alice(), &draft, &sent_at(), &store)?;
    let compressor = config.compression.compressor();
    let encoded = plain.clone().compress(&*compressor)?;
    let sent = MessageEncryptor::new(config.limits).make_sendable_message(
        &encoded,
        BOB_ENC_KEY,
        &keys().bob_encryption.public_key(),
        ALICE_SIG_KEY,
        &keys().alice_signature,
    )?;
    let sent_id = store.commit_draft(conv.id, &alice(), sent_at())?;

    Ok(Outbox {
        store,
        sent,
        sent_id,
        plain,
    })
}

fn bob_store() -> anyhow::Result<MemoryStore> {
    let store = MemoryStore::new();
    store.add_private_key(BOB_ENC_KEY, keys().bob_encryption.clone())?;
    store.add_public_key(alice(), ALICE_SIG_KEY, keys().alice_signature.public_key())?;
    Ok(store)
}

fn wire(id: MessageId, sent: &SendableMessage) -> WireMessage {
    WireMessage {
        id,
        last_modified: 1,
        date_received: DateTime::parse_from_rfc3339("2024-03-01T00:00:00Z").unwrap(),
        key_safe: sent.key_safe.clone(),
        content: sent.content.clone(),
        meta: Vec::new(),
    }
}

#[test]
fn message_with_attachments_reaches_bob() -> anyhow::Result<()> {
    let config = CodecConfig::default();
    let outbox = alice_sends(&config)?;
    let bob_store = bob_store()?;
    let cache = CachingPrivateKeyProvider::new(bob_store.clone());
    let pdk = SymmetricKey::generate_private_data_key();
    let compressor = config.compression.compressor();

    let decrypted = MessageDecryptor::new(&cache, &pdk)
        .with_limits(config.limits)
        .decrypt(wire(500, &outbox.sent))?;
    let decoded = MessageDecoder::new(decrypted, bob(), &*compressor, &bob_store)
        .decode(config.verify())?;
    let id = bob_store.save_message(decoded.make_conversation(&bob_store));
    assert_eq!(id, 500);

    let record = bob_store.message_record(id).expect("record saved");
    assert_eq!(record.sender, alice());
    assert_eq!(record.text, "See attached.");
    assert_eq!(record.date_sent, sent_at());
    assert!(!record.read);

    let conversations = bob_store.conversations();
    assert_eq!(conversations.len(), 1);
    assert_eq!(conversations[0].participants, [alice()].into_iter().collect());

    let sender = bob_store.message_sender(id).expect("sender saved");
    assert_eq!(sender.organization, "Wonderland");
    assert_eq!(bob_store.avatar_count(), 1);

    let index: Vec<_> = bob_store.message_attachments(id).into_iter().map(|a| a.meta).collect();
    assert_eq!(index.len(), 3);
    let mut factory = bob_store.attachment_factory(id);
    let splitter = AttachmentSplitter::new(&index, &mut factory)?;
    AttachmentPipeline::new(
        &record.symm_key,
        &*compressor,
        splitter,
        &config.limits,
        config.attachment_chunk_bytes,
    )
    .open(&outbox.sent.attachments)?;

    assert_eq!(bob_store.attachment_content(id, 0).unwrap(), b"down the rabbit hole");
    assert!(bob_store.attachment_content(id, 1).unwrap().is_empty());
    assert_eq!(bob_store.attachment_content(id, 2).unwrap(), vec![0x42; 4096]);

    bob_store.set_flags(id, true, false)?;
    assert!(bob_store.message_record(id).unwrap().read);
    Ok(())
}

#[test]
fn repeated_messages_hit_the_key_cache() -> anyhow::Result<()> {
    let config = CodecConfig::default();
    let outbox = alice_sends(&config)?;
    let cache = CachingPrivateKeyProvider::new(bob_store()?);
    let pdk = SymmetricKey::generate_private_data_key();

    for id in 1..=3 {
        MessageDecryptor::new(&cache, &pdk).decrypt(wire(id, &outbox.sent))?;
    }
    assert_eq!((cache.misses(), cache.hits()), (1, 2));
    Ok(())
}

#[test]
fn corrupted_attachment_index_is_caught_by_hash() -> anyhow::Result<()> {
    let config = CodecConfig::default();
    let outbox = alice_sends(&config)?;
    let bob_store = bob_store()?;
    let pdk = SymmetricKey::generate_private_data_key();
    let compressor = config.compression.compressor();

    let decrypted = MessageDecryptor::new(&bob_store, &pdk).decrypt(wire(9, &outbox.sent))?;
    let decoded = MessageDecoder::new(decrypted, bob(), &*compressor, &bob_store).decode(VerifySignature::True)?;
    let id = bob_store.save_message(decoded.make_conversation(&bob_store));
    let symm_key = bob_store.message_record(id).unwrap().symm_key;

    let mut index: Vec<_> = bob_store.message_attachments(id).into_iter().map(|a| a.meta).collect();
    index[2].hash = dl_crypto::hash::sha512_hex(b"something else");
    let mut factory = bob_store.attachment_factory(id);
    let splitter = AttachmentSplitter::new(&index, &mut factory)?;
    let err = AttachmentPipeline::new(&symm_key, &*compressor, splitter, &config.limits, 1000)
        .open(&outbox.sent.attachments)
        .unwrap_err();
    assert!(matches!(err, CodecError::Integrity(IntegrityError::HashMismatch { index: 2 })));

    // earlier attachments were already delivered
    assert_eq!(bob_store.attachment_content(id, 0).unwrap(), b"down the rabbit hole");
    assert!(bob_store.attachment_content(id, 2).unwrap().is_empty());
    Ok(())
}

#[test]
fn unknown_signer_is_rejected() -> anyhow::Result<()> {
    let config = CodecConfig::default();
    let outbox = alice_sends(&config)?;
    let bob_store = MemoryStore::new();
    bob_store.add_private_key(BOB_ENC_KEY, keys().bob_encryption.clone())?;
    let pdk = SymmetricKey::generate_private_data_key();

    let decrypted = MessageDecryptor::new(&bob_store, &pdk).decrypt(wire(1, &outbox.sent))?;
    let err = MessageDecoder::new(decrypted, bob(), &*config.compression.compressor(), &bob_store)
        .decode(VerifySignature::True)
        .unwrap_err();
    assert!(err.is_bad_wire_data());
    assert!(matches!(err, CodecError::SignatureVerificationKeyMissing { .. }));
    Ok(())
}

#[test]
fn committed_message_reencodes_to_the_same_body() -> anyhow::Result<()> {
    let outbox = alice_sends(&CodecConfig::default())?;
    let again = encoder::encode_stored_message(outbox.sent_id, &outbox.store)?;
    assert_eq!(again, outbox.plain);
    Ok(())
}
