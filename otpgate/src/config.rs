//! Configuration
//!
//! One YAML document, deserialized once at startup and passed by reference.
//! No component reads ambient environment state.

use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};

use reqwest::Url;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{
    chat::AdminPanel,
    insight::{Extractor, ServiceRule},
    message::ChatManager,
    portal::PortalClient,
    service::{App, ForwardService},
    storage::{DestinationRegistry, ProcessedLedger},
};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AppConfig {
    /// Client configuration, such as proxy, user agent, etc.
    pub client: ClientConfig,
    /// Portal endpoints and credentials
    pub portal: PortalConfig,
    /// Telegram bot configuration
    pub telegram: TelegramConfig,
    /// State file locations and seed data
    pub storage: StorageConfig,
    /// Polling configuration
    pub fetch: FetchConfig,
    /// Service keyword rules, checked in order, first match wins
    pub services: Vec<ServiceRule>,
    /// Country flag decorations, keyed by the group label's first token
    #[serde(default)]
    pub flags: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientConfig {
    user_agent: Option<String>,
    proxy: Option<String>,
    no_proxy: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PortalConfig {
    pub login_url: Url,
    /// Base the fixed drill-down endpoints are joined onto.
    pub base_url: Url,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TelegramConfig {
    pub name: String,
    pub token: String,
    /// User ids allowed to run admin commands.
    pub admins: Vec<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct StorageConfig {
    #[serde(default = "default_destinations_file")]
    pub destinations_file: PathBuf,
    #[serde(default = "default_processed_file")]
    pub processed_file: PathBuf,
    /// Destinations used until the file exists.
    #[serde(default)]
    pub initial_destinations: Vec<String>,
}

fn default_destinations_file() -> PathBuf {
    PathBuf::from("chat_ids.json")
}

fn default_processed_file() -> PathBuf {
    PathBuf::from("processed_sms_ids.json")
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FetchConfig {
    pub interval_seconds: u64,
}

impl ClientConfig {
    /// Build a client with a fresh cookie jar; the portal session lives in
    /// the cookies, so every cycle calls this again.
    pub fn build(&self) -> Result<reqwest::Client, crate::Error> {
        let mut client = reqwest::Client::builder()
            .cookie_store(true)
            .user_agent(self.user_agent.clone().unwrap_or_else(crate::ua));

        if let Some(proxy) = &self.proxy {
            let proxy = reqwest::Proxy::all(proxy.clone())?;
            let proxy = match &self.no_proxy {
                Some(no_proxy) => proxy.no_proxy(reqwest::NoProxy::from_string(no_proxy)),
                None => proxy.no_proxy(reqwest::NoProxy::from_env()),
            };
            info!("Using proxy {:?}", proxy);
            client = client.proxy(proxy);
        }

        Ok(client.build()?)
    }
}

impl TelegramConfig {
    pub fn build(&self) -> teloxide::Bot {
        teloxide::Bot::new(self.token.to_owned())
    }
}

impl AppConfig {
    pub fn build(&self) -> Result<App, crate::Error> {
        let bot = self.telegram.build();

        let destinations = Arc::new(DestinationRegistry::new(
            &self.storage.destinations_file,
            self.storage.initial_destinations.clone(),
        ));

        let forwarder = Arc::new(ForwardService {
            source: PortalClient::new(self.portal.clone(), self.client.clone()),
            extractor: Extractor::new(self.services.clone(), self.flags.clone()),
            deliverer: ChatManager { bot: bot.clone() },
            destinations: destinations.clone(),
            processed: ProcessedLedger::new(&self.storage.processed_file),
            poll_interval: Duration::from_secs(self.fetch.interval_seconds),
        });

        let panel = Arc::new(AdminPanel {
            registry: destinations,
            admins: self.telegram.admins.clone(),
        });

        Ok(App {
            forwarder,
            bot,
            panel,
        })
    }
}
