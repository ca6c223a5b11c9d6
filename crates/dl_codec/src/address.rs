//! Account addresses of the form `user#domain`.
//!
//! Both parts are lower-cased on parse.  The username is alphanumeric with
//! single `.`, `-` or `_` separators (at most 64 chars); the domain is a
//! dotted hostname whose last label starts with a letter (at most 255 chars,
//! labels at most 63).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ConversionError;

const USERNAME_MAX_LENGTH: usize = 64;
const DOMAIN_MAX_LENGTH: usize = 255;
const LABEL_MAX_LENGTH: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    pub fn parse(input: &str) -> Result<Self, ConversionError> {
        let invalid = || ConversionError::InvalidAddress(input.to_owned());

        let mut parts = input.split('#');
        let (user, domain) = match (parts.next(), parts.next(), parts.next()) {
            (Some(user), Some(domain), None) => (user.to_lowercase(), domain.to_lowercase()),
            _ => return Err(invalid()),
        };

        if user.len() > USERNAME_MAX_LENGTH || !is_valid_username(&user) {
            return Err(invalid());
        }
        if domain.len() > DOMAIN_MAX_LENGTH || !is_valid_domain(&domain) {
            return Err(invalid());
        }
        Ok(Self(format!("{user}#{domain}")))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn username(&self) -> &str {
        self.0.split('#').next().unwrap_or_default()
    }

    pub fn domain(&self) -> &str {
        self.0.split('#').nth(1).unwrap_or_default()
    }
}

/// `x([.-_]x)*` with `x` lower-case alphanumeric.
fn is_valid_username(user: &str) -> bool {
    !user.is_empty()
        && user
            .split(|c| matches!(c, '.' | '-' | '_'))
            .all(|part| !part.is_empty() && part.bytes().all(is_lower_alnum))
}

fn is_valid_domain(domain: &str) -> bool {
    let labels: Vec<&str> = domain.split('.').collect();
    if labels.len() < 2 {
        return false;
    }
    let Some((last, rest)) = labels.split_last() else {
        return false;
    };
    let hyphenated = |label: &str| {
        label.len() <= LABEL_MAX_LENGTH
            && label
                .split('-')
                .all(|part| !part.is_empty() && part.bytes().all(is_lower_alnum))
    };
    rest.iter().all(|label| hyphenated(label))
        && hyphenated(last)
        && last.as_bytes().first().is_some_and(u8::is_ascii_lowercase)
}

fn is_lower_alnum(b: u8) -> bool {
    b.is_ascii_lowercase() || b.is_ascii_digit()
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Address {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
