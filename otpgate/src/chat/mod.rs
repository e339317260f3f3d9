//! Admin command surface.
//!
//! Every command is gated on the configured admin allow-list; only these
//! handlers ever mutate the destination registry.

use std::sync::Arc;

use teloxide::{
    dispatching::{UpdateFilterExt, UpdateHandler},
    prelude::Dispatcher,
    requests::Requester,
    types::{Message, Update, User},
    utils::command::BotCommands,
    Bot,
};

use crate::{storage::DestinationRegistry, Error};

#[derive(Debug, BotCommands, Clone)]
#[command(
    rename_rule = "snake_case",
    description = "These commands are supported:"
)]
pub enum TelegramCommand {
    #[command(description = "show this help.")]
    Start,
    #[command(description = "register a destination chat.")]
    AddChat { id: String },
    #[command(description = "unregister a destination chat.")]
    RemoveChat { id: String },
    #[command(description = "list registered destination chats.")]
    ListChats,
}

const NOT_AUTHORIZED: &str = "You are not authorized to use admin commands.";

/// Shared state of the command handlers.
pub struct AdminPanel {
    pub registry: Arc<DestinationRegistry>,
    pub admins: Vec<u64>,
}

impl AdminPanel {
    pub fn is_admin(&self, user: Option<&User>) -> bool {
        user.map_or(false, |user| self.admins.contains(&user.id.0))
    }
}

pub fn dispatcher(
    bot: Bot,
    panel: Arc<AdminPanel>,
) -> Dispatcher<Bot, Error, teloxide::dispatching::DefaultKey> {
    Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![panel])
        .enable_ctrlc_handler()
        .build()
}

pub fn schema() -> UpdateHandler<crate::Error> {
    use dptree::case;

    let command_handler = teloxide::filter_command::<TelegramCommand, _>()
        .branch(case![TelegramCommand::Start].endpoint(start))
        .branch(case![TelegramCommand::AddChat { id }].endpoint(add_chat))
        .branch(case![TelegramCommand::RemoveChat { id }].endpoint(remove_chat))
        .branch(case![TelegramCommand::ListChats].endpoint(list_chats));

    Update::filter_message().branch(command_handler)
}

async fn start(bot: Bot, msg: Message, panel: Arc<AdminPanel>) -> crate::Result<()> {
    if !panel.is_admin(msg.from()) {
        bot.send_message(msg.chat.id, NOT_AUTHORIZED).await?;
        return Ok(());
    }

    let text = format!(
        "Welcome Admin!\n{}\n\nNew OTPs are forwarded to every registered chat.",
        TelegramCommand::descriptions()
    );
    bot.send_message(msg.chat.id, text).await?;
    Ok(())
}

async fn add_chat(
    bot: Bot,
    msg: Message,
    id: String,
    panel: Arc<AdminPanel>,
) -> crate::Result<()> {
    if !panel.is_admin(msg.from()) {
        bot.send_message(msg.chat.id, NOT_AUTHORIZED).await?;
        return Ok(());
    }

    let reply = if panel.registry.add(&id).await? {
        format!("Added chat ID: {id}")
    } else {
        "Chat ID already registered.".to_string()
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn remove_chat(
    bot: Bot,
    msg: Message,
    id: String,
    panel: Arc<AdminPanel>,
) -> crate::Result<()> {
    if !panel.is_admin(msg.from()) {
        bot.send_message(msg.chat.id, NOT_AUTHORIZED).await?;
        return Ok(());
    }

    let reply = if panel.registry.remove(&id).await? {
        format!("Removed chat ID: {id}")
    } else {
        "Chat ID not found.".to_string()
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

async fn list_chats(bot: Bot, msg: Message, panel: Arc<AdminPanel>) -> crate::Result<()> {
    if !panel.is_admin(msg.from()) {
        bot.send_message(msg.chat.id, NOT_AUTHORIZED).await?;
        return Ok(());
    }

    let destinations = panel.registry.all().await;
    let reply = if destinations.is_empty() {
        "No chat IDs registered.".to_string()
    } else {
        format!("Registered chat IDs:\n{}", destinations.join("\n"))
    };
    bot.send_message(msg.chat.id, reply).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn panel(temp: &TempDir, admins: Vec<u64>) -> AdminPanel {
        AdminPanel {
            registry: Arc::new(DestinationRegistry::new(temp.path().join("chats.json"), vec![])),
            admins,
        }
    }

    fn user(id: u64) -> User {
        User {
            id: teloxide::types::UserId(id),
            is_bot: false,
            first_name: "test".to_string(),
            last_name: None,
            username: None,
            language_code: None,
            is_premium: false,
            added_to_attachment_menu: false,
        }
    }

    #[test]
    fn test_admin_gate() {
        let temp = TempDir::new().unwrap();
        let panel = panel(&temp, vec![42]);

        assert!(panel.is_admin(Some(&user(42))));
        assert!(!panel.is_admin(Some(&user(7))));
        assert!(!panel.is_admin(None));
    }

    #[tokio::test]
    async fn test_registry_semantics_behind_the_commands() {
        let temp = TempDir::new().unwrap();
        let panel = panel(&temp, vec![42]);

        // /add_chat 123 twice: second one is refused, list unchanged
        assert!(panel.registry.add("123").await.unwrap());
        assert!(!panel.registry.add("123").await.unwrap());
        assert_eq!(panel.registry.all().await, vec!["123".to_string()]);

        // /remove_chat of an unknown id is a visible no-op
        assert!(!panel.registry.remove("999").await.unwrap());
        assert_eq!(panel.registry.all().await, vec!["123".to_string()]);
    }

    #[test]
    fn test_command_parsing() {
        let command = TelegramCommand::parse("/add_chat 123", "otpgate_bot").unwrap();
        assert!(matches!(command, TelegramCommand::AddChat { id } if id == "123"));

        let command = TelegramCommand::parse("/list_chats", "otpgate_bot").unwrap();
        assert!(matches!(command, TelegramCommand::ListChats));
    }
}
