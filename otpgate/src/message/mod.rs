use async_trait::async_trait;
use teloxide::{
    payloads::SendMessageSetters,
    requests::Requester,
    types::{ChatId, ParseMode, Recipient},
    utils::markdown::{escape, escape_code},
};

use crate::{insight::SmsRecord, Error, Result};

/// Render a value as an outbound MarkdownV2 message.
pub trait Sendable {
    fn message(&self) -> String;
}

impl Sendable for SmsRecord {
    fn message(&self) -> String {
        format!(
            "🔔 *New OTP Received*\n\n\
             📞 *Number:* `{}`\n\
             🔑 *Code:* `{}`\n\
             🏷️ *Service:* {} {}\n\
             🌍 *Country:* {} {}\n\
             ⏱️ *Time:* `{}`\n\n\
             💬 *Message:*\n```\n{}\n```",
            escape_code(&self.number),
            escape_code(&self.code),
            self.emoji,
            escape(&self.service),
            escape(&self.country),
            self.flag,
            escape_code(&self.at.format("%Y-%m-%d %H:%M:%S").to_string()),
            escape_code(&self.text),
        )
    }
}

/// Delivery to one destination. Behind a trait so the fan-out engine can be
/// exercised without a live bot.
#[async_trait]
pub trait Deliverer: Send + Sync {
    async fn deliver(&self, destination: &str, record: &SmsRecord) -> Result<()>;
}

/// Sends classified messages through the Telegram bot.
pub struct ChatManager {
    pub bot: teloxide::Bot,
}

#[async_trait]
impl Deliverer for ChatManager {
    async fn deliver(&self, destination: &str, record: &SmsRecord) -> Result<()> {
        self.bot
            .send_message(parse_destination(destination)?, record.message())
            .parse_mode(ParseMode::MarkdownV2)
            .await?;
        Ok(())
    }
}

/// A destination string is either a numeric chat id or a `@channelusername`.
pub fn parse_destination(destination: &str) -> Result<Recipient> {
    if destination.starts_with('@') {
        return Ok(Recipient::ChannelUsername(destination.to_string()));
    }
    destination
        .parse::<i64>()
        .map(|id| Recipient::Id(ChatId(id)))
        .map_err(|_| Error::InvalidDestination(destination.to_string()))
}
