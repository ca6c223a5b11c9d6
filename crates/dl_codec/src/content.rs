//! Content envelope: the signed, encrypted JSON body of a message.
//!
//! Plaintext layout before encryption:
//!   [ sig_key_id: u32 BE | sig_len: u32 BE | signature | body ]
//!
//! The signature is RSA-PSS(SHA-512) over `body`.  The whole buffer is
//! sealed with AES-256/GCM under the message key and the fixed IV
//! `"content"`; the IV is not transmitted.  Every message gets a fresh key,
//! so the fixed IV is never reused under one key.

use std::collections::BTreeSet;

use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, FixedOffset};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use dl_crypto::symmetric::{self, CONTENT_IV};
use dl_crypto::{signer, AsymmetricKeyType, IvMode, PrivateKey, SymmetricKey};

use crate::address::Address;
use crate::checked::{self, AllowEmpty, FieldExt};
use crate::error::{CodecError, Result};
use crate::provider::PublicKeyLookup;
use crate::types::{AttachmentMeta, Avatar, ParsedMessageContent, SenderInfo};
use crate::wire::read_u32;

const HEADER_BYTES: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecryptedContent {
    pub sig_key_id: u32,
    pub signature: Vec<u8>,
    /// The signed body, still compressed if the sender compressed it.
    pub data: Vec<u8>,
}

// ── Envelope ──────────────────────────────────────────────────────────────────

/// Sign `body` and seal it under the message key.
pub fn encrypt(
    body: &[u8],
    sig_key_id: u32,
    signing_key: &PrivateKey,
    symm_key: &SymmetricKey,
) -> Result<Vec<u8>> {
    let signature = signer::sign(body, signing_key)?;
    let sig_len = u32::try_from(signature.len())
        .map_err(|_| CodecError::invalid("signature too long"))?;

    let mut plaintext = Vec::with_capacity(HEADER_BYTES + signature.len() + body.len());
    plaintext.extend_from_slice(&sig_key_id.to_be_bytes());
    plaintext.extend_from_slice(&sig_len.to_be_bytes());
    plaintext.extend_from_slice(&signature);
    plaintext.extend_from_slice(body);

    Ok(symmetric::encrypt(symm_key, CONTENT_IV, &plaintext, IvMode::Omit)?)
}

/// Open the envelope and split off the signature header.
pub fn decrypt(ciphertext: &[u8], symm_key: &SymmetricKey) -> Result<DecryptedContent> {
    let plaintext = symmetric::decrypt(symm_key, CONTENT_IV, ciphertext)
        .map_err(|e| CodecError::invalid_with("content decryption failed", e))?;

    if plaintext.len() < HEADER_BYTES {
        return Err(CodecError::invalid("decrypted data too short"));
    }
    let sig_key_id = read_u32(&plaintext[0..4]);
    let sig_len = read_u32(&plaintext[4..8]) as usize;
    let rest = &plaintext[HEADER_BYTES..];
    if rest.len() < sig_len {
        return Err(CodecError::invalid("decrypted data too short [2]"));
    }
    let (signature, data) = rest.split_at(sig_len);

    Ok(DecryptedContent {
        sig_key_id,
        signature: signature.to_vec(),
        data: data.to_vec(),
    })
}

/// Check the content signature against the sender's signature key.
pub fn verify(content: &DecryptedContent, sender: &Address, keys: &dyn PublicKeyLookup) -> Result<()> {
    let key = keys
        .public_key(sender, AsymmetricKeyType::Signature, content.sig_key_id)
        .ok_or_else(|| CodecError::SignatureVerificationKeyMissing {
            address: sender.to_string(),
            key_id: content.sig_key_id,
        })?;

    if !signer::verify(&content.data, &content.signature, &key)? {
        warn!(sender = %sender, sig_key_id = content.sig_key_id, "[content] signature verification failed");
        return Err(CodecError::SignatureVerificationFailed);
    }
    Ok(())
}

// ── Body JSON ─────────────────────────────────────────────────────────────────

/// Parse the (decompressed) body JSON.
///
/// `own_address` is the local user: it never appears among the
/// participants, and the sender is added unless it is the local user.
pub fn parse(body: &[u8], own_address: &Address) -> Result<ParsedMessageContent> {
    let json: Value =
        serde_json::from_slice(body).map_err(|e| CodecError::invalid_with("content invalid", e))?;
    if !json.is_object() {
        return Err(CodecError::invalid("content is not an object"));
    }

    if !json["sender"].is_object() {
        return Err(CodecError::invalid("sender is not an object"));
    }
    let sender = parse_sender(&json["sender"])?;

    let recipients = json["recipients"]
        .as_array()
        .ok_or_else(|| CodecError::invalid("recipients is not an array"))?;
    if recipients.is_empty() {
        return Err(CodecError::invalid("recipients are empty"));
    }

    let mut participants = BTreeSet::new();
    if sender.address != *own_address {
        participants.insert(sender.address.clone());
    }
    for value in recipients {
        let address = checked::to_address(value).field("recipient address")?;
        if address == sender.address {
            return Err(CodecError::invalid("recipients contain the sender"));
        }
        if address != *own_address {
            participants.insert(address);
        }
    }

    let attachments = parse_attachments(&json["attachmentsIndex"])?;

    let date_sent = checked::to_date_time(&json["dateSent"]).field("date sent")?;
    let text = checked::to_string_or(&json["text"], "").field("text")?;
    let footer = checked::to_string_or(&json["footer"], "").field("footer")?;

    debug!(
        sender = %sender.address,
        participants = participants.len(),
        attachments = attachments.len(),
        "[content] parsed"
    );

    Ok(ParsedMessageContent {
        sender,
        participants,
        date_sent,
        text,
        footer,
        attachments,
    })
}

fn parse_sender(sender: &Value) -> Result<SenderInfo> {
    let address = checked::to_address(&sender["address"]).field("sender address")?;
    let name = checked::to_string(&sender["name"], AllowEmpty::No).field("sender name")?;
    let organization =
        checked::to_string_or(&sender["organization"], "").field("sender organization")?;

    let avatar = match &sender["avatar"] {
        Value::Null => None,
        Value::Object(obj) if obj.is_empty() => None,
        Value::Object(obj) if obj.len() == 2 => {
            let mime_type = checked::to_string(&sender["avatar"]["mimeType"], AllowEmpty::No)
                .field("avatar mimeType")?;
            let data = checked::to_base64_bytes(&sender["avatar"]["data"], AllowEmpty::No)
                .field("avatar data")?;
            Some(Avatar { mime_type, data })
        }
        Value::Object(_) => {
            return Err(CodecError::invalid(
                "sender.avatar must be empty or consist of mimeType and data",
            ))
        }
        _ => return Err(CodecError::invalid("sender.avatar must be null or an object")),
    };

    Ok(SenderInfo {
        address,
        name,
        organization,
        avatar,
    })
}

fn parse_attachments(index: &Value) -> Result<Vec<AttachmentMeta>> {
    let entries = match index {
        Value::Null => return Ok(Vec::new()),
        Value::Array(entries) => entries,
        _ => return Err(CodecError::invalid("attachmentsIndex is not an array")),
    };

    let mut out = Vec::with_capacity(entries.len());
    for (i, entry) in entries.iter().enumerate() {
        let index = u32::try_from(i).map_err(|_| CodecError::invalid("too many attachments"))?;
        out.push(AttachmentMeta {
            index,
            filename: checked::to_string(&entry["filename"], AllowEmpty::No)
                .field("attachment filename")?,
            mime_type: checked::to_string(&entry["mimeType"], AllowEmpty::No)
                .field("attachment mimeType")?,
            size: checked::to_u32(&entry["size"]).field("attachment size")?,
            note: checked::to_string_or(&entry["note"], "").field("attachment note")?,
            hash: checked::to_hex_string(&entry["hash"], AllowEmpty::No)
                .field("attachment hash")?,
        });
    }
    Ok(out)
}

/// Fields of an outgoing body.
#[derive(Debug, Clone, Copy)]
pub struct BodyFields<'a> {
    pub sender: &'a SenderInfo,
    pub recipients: &'a BTreeSet<Address>,
    pub date_sent: &'a DateTime<FixedOffset>,
    pub text: &'a str,
    pub footer: &'a str,
    pub attachments: &'a [AttachmentMeta],
}

/// Serialize an outgoing body as compact JSON.
pub fn encode(fields: BodyFields<'_>) -> Result<Vec<u8>> {
    let sender = fields.sender;
    let mut avatar = Map::new();
    if let Some(a) = &sender.avatar {
        if !(a.mime_type.is_empty() || a.data.is_empty()) {
            avatar.insert("mimeType".into(), Value::from(a.mime_type.as_str()));
            avatar.insert("data".into(), Value::from(STANDARD.encode(&a.data)));
        }
    }

    let index: Vec<Value> = fields
        .attachments
        .iter()
        .map(|att| {
            json!({
                "filename": att.filename,
                "mimeType": att.mime_type,
                "note": att.note,
                "size": att.size,
                "hash": att.hash,
            })
        })
        .collect();

    let body = json!({
        "sender": {
            "address": sender.address.as_str(),
            "name": sender.name,
            "organization": sender.organization,
            "avatar": avatar,
        },
        "recipients": fields.recipients.iter().map(Address::as_str).collect::<Vec<_>>(),
        "dateSent": checked::date_time_to_string(fields.date_sent),
        "text": fields.text,
        "footer": fields.footer,
        "attachmentsIndex": index,
    });
    serde_json::to_vec(&body).map_err(|e| CodecError::invalid_with("content serialization failed", e))
}
