//! Classification of scraped SMS text.
//!
//! Everything here is a pure function of its inputs: the same group label,
//! phone number and text always produce the same [`SmsRecord`].

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Sentinel service name when no keyword rule matches.
pub const UNKNOWN_SERVICE: &str = "Unknown";
/// Sentinel country when the group label carries no leading token.
pub const UNKNOWN_COUNTRY: &str = "Unknown Country";
/// Sentinel code when the text has no 4-8 digit run.
pub const NO_CODE: &str = "N/A";

const UNKNOWN_SERVICE_EMOJI: &str = "❓";
const UNKNOWN_COUNTRY_FLAG: &str = "🏴‍☠️";

/// One keyword rule mapping message text to a service name.
///
/// Rules are checked in configuration order and the first match wins.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ServiceRule {
    pub name: String,
    /// Case-insensitive substrings of the message text.
    pub keywords: Vec<String>,
    #[serde(default = "default_emoji")]
    pub emoji: String,
}

fn default_emoji() -> String {
    UNKNOWN_SERVICE_EMOJI.to_string()
}

/// A classified SMS, ready for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsRecord {
    pub id: String,
    pub at: DateTime<Utc>,
    pub number: String,
    pub country: String,
    pub flag: String,
    pub service: String,
    pub emoji: String,
    pub code: String,
    pub text: String,
}

/// Builds [`SmsRecord`]s from raw scraped text.
pub struct Extractor {
    services: Vec<ServiceRule>,
    flags: HashMap<String, String>,
    code: Regex,
}

impl Extractor {
    pub fn new(services: Vec<ServiceRule>, flags: HashMap<String, String>) -> Self {
        Self {
            services,
            flags,
            code: Regex::new(r"\b(\d{4,8})\b").unwrap(),
        }
    }

    /// Classify one scraped message.
    pub fn extract(
        &self,
        group: &str,
        number: &str,
        text: &str,
        at: DateTime<Utc>,
    ) -> SmsRecord {
        let country = group
            .split_whitespace()
            .next()
            .unwrap_or(UNKNOWN_COUNTRY)
            .to_string();
        let flag = self
            .flags
            .get(&country)
            .or_else(|| self.flags.get(UNKNOWN_COUNTRY))
            .cloned()
            .unwrap_or_else(|| UNKNOWN_COUNTRY_FLAG.to_string());

        let lower = text.to_lowercase();
        let rule = self.services.iter().find(|rule| {
            rule.keywords
                .iter()
                .any(|keyword| lower.contains(&keyword.to_lowercase()))
        });
        let (service, emoji) = match rule {
            Some(rule) => (rule.name.clone(), rule.emoji.clone()),
            None => (
                UNKNOWN_SERVICE.to_string(),
                UNKNOWN_SERVICE_EMOJI.to_string(),
            ),
        };

        let code = self
            .code
            .captures(text)
            .map(|capture| capture[1].to_string())
            .unwrap_or_else(|| NO_CODE.to_string());

        SmsRecord {
            id: message_id(number, text),
            at,
            number: number.to_string(),
            country,
            flag,
            service,
            emoji,
            code,
            text: text.to_string(),
        }
    }
}

/// Durable dedupe key for a message.
///
/// The digest covers the phone number and the trimmed text, so the key is
/// identical across process restarts. 64 bits of digest are kept; within one
/// state file that is plenty.
pub fn message_id(number: &str, text: &str) -> String {
    let mut digest = Sha256::new();
    digest.update(number.as_bytes());
    digest.update(b"\n");
    digest.update(text.trim().as_bytes());
    format!("{}-{}", number, hex::encode(&digest.finalize()[..8]))
}
