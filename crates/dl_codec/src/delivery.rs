//! Per-recipient delivery status.
//!
//! Delivery sync is switched off on the wire: `meta::encode` never writes
//! it and `meta::interpret` does not read it.  The codec below stays
//! complete so the field can be turned back on without touching the
//! format.
//!
//! JSON shape, keyed by recipient address:
//!   {"bob#example.com": {"state": "delivered", "date": "..."},
//!    "carol#example.com": {"state": "failed", "date": "...", "reason": "too_large"},
//!    "dave#example.com": {"state": "unsent", "lock": {"holder": "...", "expires": "..."}}}

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Value};

use crate::address::Address;
use crate::checked::{self, AllowEmpty};
use crate::error::{CodecError, ConversionError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeliveryReason {
    Unknown,
    DoesntExist,
    TooLarge,
    Canceled,
}

impl DeliveryReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::DoesntExist => "doesnt_exist",
            Self::TooLarge => "too_large",
            Self::Canceled => "canceled",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ConversionError> {
        match s {
            "unknown" => Ok(Self::Unknown),
            "doesnt_exist" => Ok(Self::DoesntExist),
            "too_large" => Ok(Self::TooLarge),
            "canceled" => Ok(Self::Canceled),
            other => Err(ConversionError::UnknownVariant {
                kind: "delivery reason",
                value: other.to_owned(),
            }),
        }
    }
}

impl fmt::Display for DeliveryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Claim on an unsent delivery by one of the user's devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryLock {
    pub holder: String,
    pub expires: DateTime<FixedOffset>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryState {
    Unsent { lock: Option<DeliveryLock> },
    Delivered { date: DateTime<FixedOffset> },
    Failed { date: DateTime<FixedOffset>, reason: DeliveryReason },
}

impl DeliveryState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unsent { .. } => "unsent",
            Self::Delivered { .. } => "delivered",
            Self::Failed { .. } => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub recipient: Address,
    pub state: DeliveryState,
}

impl Delivery {
    /// Delivery or failure date; unsent entries have none.
    pub fn date(&self) -> Option<&DateTime<FixedOffset>> {
        match &self.state {
            DeliveryState::Unsent { .. } => None,
            DeliveryState::Delivered { date } | DeliveryState::Failed { date, .. } => Some(date),
        }
    }
}

// By date, undated first; recipient breaks ties.
impl Ord for Delivery {
    fn cmp(&self, other: &Self) -> Ordering {
        self.date()
            .cmp(&other.date())
            .then_with(|| self.recipient.cmp(&other.recipient))
            .then_with(|| self.state.name().cmp(other.state.name()))
            .then_with(|| state_detail(&self.state).cmp(&state_detail(&other.state)))
    }
}

/// Remaining state fields, so that only equal deliveries compare equal.
fn state_detail(state: &DeliveryState) -> (Option<&'static str>, Option<(&str, &DateTime<FixedOffset>)>) {
    match state {
        DeliveryState::Failed { reason, .. } => (Some(reason.as_str()), None),
        DeliveryState::Unsent { lock: Some(lock) } => (None, Some((lock.holder.as_str(), &lock.expires))),
        _ => (None, None),
    }
}

impl PartialOrd for Delivery {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Parse a `delivery` object.  `null` is an empty list.  The result is sorted.
pub fn parse(json: &Value) -> Result<Vec<Delivery>> {
    let records = match json {
        Value::Null => return Ok(Vec::new()),
        Value::Object(records) => records,
        _ => return Err(CodecError::invalid("delivery is not an object")),
    };

    let mut parsed = Vec::with_capacity(records.len());
    for (recipient, record) in records {
        if !record.is_object() {
            return Err(CodecError::invalid("stateRecord is not an object"));
        }
        let delivery = parse_record(recipient, record)
            .map_err(|e| CodecError::invalid_with("failed to parse stateRecord", e))?;
        parsed.push(delivery);
    }
    parsed.sort();
    Ok(parsed)
}

fn parse_record(recipient: &str, record: &Value) -> Result<Delivery, ConversionError> {
    let recipient = Address::parse(recipient)?;
    let state = match checked::to_string(&record["state"], AllowEmpty::No)?.as_str() {
        "unsent" => {
            let lock = match &record["lock"] {
                Value::Null => None,
                lock => Some(DeliveryLock {
                    holder: checked::to_string(&lock["holder"], AllowEmpty::No)?,
                    expires: checked::to_date_time(&lock["expires"])?,
                }),
            };
            DeliveryState::Unsent { lock }
        }
        "delivered" => DeliveryState::Delivered {
            date: checked::to_date_time(&record["date"])?,
        },
        "failed" => DeliveryState::Failed {
            date: checked::to_date_time(&record["date"])?,
            reason: DeliveryReason::parse(&checked::to_string(&record["reason"], AllowEmpty::No)?)?,
        },
        other => {
            return Err(ConversionError::UnknownVariant {
                kind: "delivery state",
                value: other.to_owned(),
            })
        }
    };
    Ok(Delivery { recipient, state })
}

/// Serialize to the `delivery` object shape accepted by `parse`.
pub fn to_json(delivery: &[Delivery]) -> Value {
    let mut out = Map::new();
    for entry in delivery {
        let mut record = Map::new();
        record.insert("state".into(), Value::from(entry.state.name()));
        match &entry.state {
            DeliveryState::Unsent { lock: Some(lock) } => {
                let mut lock_obj = Map::new();
                lock_obj.insert("holder".into(), Value::from(lock.holder.as_str()));
                lock_obj.insert("expires".into(), Value::from(checked::date_time_to_string(&lock.expires)));
                record.insert("lock".into(), Value::Object(lock_obj));
            }
            DeliveryState::Unsent { lock: None } => {}
            DeliveryState::Delivered { date } => {
                record.insert("date".into(), Value::from(checked::date_time_to_string(date)));
            }
            DeliveryState::Failed { date, reason } => {
                record.insert("date".into(), Value::from(checked::date_time_to_string(date)));
                record.insert("reason".into(), Value::from(reason.as_str()));
            }
        }
        out.insert(entry.recipient.to_string(), Value::Object(record));
    }
    Value::Object(out)
}
