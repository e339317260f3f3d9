//! The periodic forwarding job.
//!
//! A cycle scrapes the portal, drops messages whose id is already in the
//! processed ledger, fans the rest out to every registered destination and
//! then persists the grown ledger once. A cycle that aborts (login, csrf or
//! summary failure) persists nothing, so its messages are retried whole on
//! the next tick.

use std::{sync::Arc, time::Duration};

use chrono::Utc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::{
    chat::AdminPanel,
    insight::Extractor,
    message::{ChatManager, Deliverer},
    portal::{PortalClient, SmsSource},
    storage::{DestinationRegistry, ProcessedLedger},
    Result,
};

/// Counters of one completed cycle.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub scraped: usize,
    pub forwarded: usize,
    pub failed_branches: usize,
}

/// Dedupe and fan-out over a source and a deliverer.
pub struct ForwardService<S, D> {
    pub source: S,
    pub extractor: Extractor,
    pub deliverer: D,
    pub destinations: Arc<DestinationRegistry>,
    pub processed: ProcessedLedger,
    pub poll_interval: Duration,
}

impl<S, D> ForwardService<S, D>
where
    S: SmsSource + 'static,
    D: Deliverer + 'static,
{
    /// Run one poll cycle. An `Err` means the scrape aborted before any
    /// message was seen; the ledger is left untouched in that case.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let destinations = self.destinations.all().await;
        let mut processed = self.processed.load().await;

        let outcome = self.source.fetch_cycle().await?;

        let mut report = CycleReport {
            scraped: outcome.messages.len(),
            failed_branches: outcome.failed_branches,
            ..Default::default()
        };

        for raw in &outcome.messages {
            let record = self
                .extractor
                .extract(&raw.group, &raw.number, &raw.text, raw.at);
            if processed.contains(&record.id) {
                continue;
            }

            for destination in &destinations {
                if let Err(error) = self.deliverer.deliver(destination, &record).await {
                    warn!(%destination, %error, "failed to deliver message");
                }
            }

            // marked processed once every destination has been attempted,
            // even if some (or all) deliveries failed
            processed.insert(record.id);
            report.forwarded += 1;
        }

        if report.forwarded > 0 {
            self.processed.save(&processed).await?;
        }

        Ok(report)
    }

    /// Poll forever. Cycles are awaited one at a time; when a cycle outlives
    /// the interval, the missed ticks are skipped instead of queued, so two
    /// cycles never overlap.
    pub async fn run(self: Arc<Self>) {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let started = Utc::now();
            match self.run_cycle().await {
                Ok(report) => {
                    let elapsed = Utc::now() - started;
                    info!(
                        scraped = report.scraped,
                        forwarded = report.forwarded,
                        failed_branches = report.failed_branches,
                        %elapsed,
                        "poll cycle done"
                    );
                }
                Err(error) => warn!(%error, "poll cycle aborted"),
            }
        }
    }
}

/// The assembled application: the forwarder, the bot and the command state.
pub struct App {
    pub forwarder: Arc<ForwardService<PortalClient, ChatManager>>,
    pub bot: teloxide::Bot,
    pub panel: Arc<AdminPanel>,
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    };

    use async_trait::async_trait;
    use tempfile::TempDir;

    use super::*;
    use crate::{
        insight::{ServiceRule, SmsRecord},
        portal::{RawSms, ScrapeOutcome},
        Error,
    };

    #[derive(Clone, Default)]
    struct StubSource {
        messages: Vec<RawSms>,
        failed_branches: usize,
        fail: bool,
    }

    #[async_trait]
    impl SmsSource for StubSource {
        async fn fetch_cycle(&self) -> Result<ScrapeOutcome> {
            if self.fail {
                return Err(Error::LoginFailed);
            }
            Ok(ScrapeOutcome {
                messages: self.messages.clone(),
                failed_branches: self.failed_branches,
            })
        }
    }

    #[derive(Clone, Default)]
    struct RecordingDeliverer {
        sent: Arc<Mutex<Vec<(String, SmsRecord)>>>,
        fail_destination: Option<String>,
    }

    #[async_trait]
    impl Deliverer for RecordingDeliverer {
        async fn deliver(&self, destination: &str, record: &SmsRecord) -> Result<()> {
            if self.fail_destination.as_deref() == Some(destination) {
                return Err(Error::InvalidDestination(destination.to_string()));
            }
            self.sent
                .lock()
                .unwrap()
                .push((destination.to_string(), record.clone()));
            Ok(())
        }
    }

    fn raw(number: &str, text: &str) -> RawSms {
        RawSms {
            group: "Pakistan 7364".to_string(),
            number: number.to_string(),
            text: text.to_string(),
            at: Utc::now(),
        }
    }

    fn service(
        temp: &TempDir,
        source: StubSource,
        deliverer: RecordingDeliverer,
        destinations: Vec<String>,
    ) -> ForwardService<StubSource, RecordingDeliverer> {
        ForwardService {
            source,
            extractor: Extractor::new(
                vec![ServiceRule {
                    name: "WhatsApp".to_string(),
                    keywords: vec!["whatsapp".to_string()],
                    emoji: "🟢".to_string(),
                }],
                HashMap::new(),
            ),
            deliverer,
            destinations: Arc::new(DestinationRegistry::new(
                temp.path().join("chats.json"),
                destinations,
            )),
            processed: ProcessedLedger::new(temp.path().join("processed.json")),
            poll_interval: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_new_messages_reach_every_destination_once() {
        let temp = TempDir::new().unwrap();
        let deliverer = RecordingDeliverer::default();
        let source = StubSource {
            messages: vec![raw("+92300", "Your WhatsApp code is 482913")],
            ..Default::default()
        };
        let service = service(
            &temp,
            source,
            deliverer.clone(),
            vec!["111".to_string(), "222".to_string()],
        );

        let report = service.run_cycle().await.unwrap();
        assert_eq!(report.forwarded, 1);

        let sent = deliverer.sent.lock().unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[0].0, "111");
        assert_eq!(sent[1].0, "222");
        assert_eq!(sent[0].1.code, "482913");
    }

    #[tokio::test]
    async fn test_processed_messages_are_not_redelivered() {
        let temp = TempDir::new().unwrap();
        let deliverer = RecordingDeliverer::default();
        let source = StubSource {
            messages: vec![raw("+92300", "Your WhatsApp code is 482913")],
            ..Default::default()
        };
        let service = service(&temp, source, deliverer.clone(), vec!["111".to_string()]);

        let first = service.run_cycle().await.unwrap();
        let second = service.run_cycle().await.unwrap();

        assert_eq!(first.forwarded, 1);
        assert_eq!(second.forwarded, 0);
        assert_eq!(deliverer.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_one_failing_destination_does_not_block_the_others() {
        let temp = TempDir::new().unwrap();
        let deliverer = RecordingDeliverer {
            fail_destination: Some("222".to_string()),
            ..Default::default()
        };
        let source = StubSource {
            messages: vec![raw("+92300", "Your WhatsApp code is 482913")],
            ..Default::default()
        };
        let service = service(
            &temp,
            source,
            deliverer.clone(),
            vec!["111".to_string(), "222".to_string(), "333".to_string()],
        );

        let report = service.run_cycle().await.unwrap();

        // the other two destinations still got it, and the id is processed
        let delivered: Vec<_> = deliverer
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(destination, _)| destination.clone())
            .collect();
        assert_eq!(delivered, vec!["111".to_string(), "333".to_string()]);
        assert_eq!(report.forwarded, 1);
        assert_eq!(service.processed.load().await.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_scrape_persists_nothing() {
        let temp = TempDir::new().unwrap();
        let service = service(
            &temp,
            StubSource::default(),
            RecordingDeliverer::default(),
            vec!["111".to_string()],
        );

        let report = service.run_cycle().await.unwrap();
        assert_eq!(report, CycleReport::default());
        assert!(!temp.path().join("processed.json").exists());
    }

    #[tokio::test]
    async fn test_aborted_scrape_persists_nothing() {
        let temp = TempDir::new().unwrap();
        let source = StubSource {
            fail: true,
            ..Default::default()
        };
        let service = service(
            &temp,
            source,
            RecordingDeliverer::default(),
            vec!["111".to_string()],
        );

        assert!(matches!(service.run_cycle().await, Err(Error::LoginFailed)));
        assert!(!temp.path().join("processed.json").exists());
    }

    #[tokio::test]
    async fn test_duplicate_texts_within_one_cycle_are_forwarded_once() {
        let temp = TempDir::new().unwrap();
        let deliverer = RecordingDeliverer::default();
        let source = StubSource {
            messages: vec![
                raw("+92300", "Your WhatsApp code is 482913"),
                raw("+92300", "Your WhatsApp code is 482913"),
            ],
            ..Default::default()
        };
        let service = service(&temp, source, deliverer.clone(), vec!["111".to_string()]);

        let report = service.run_cycle().await.unwrap();
        assert_eq!(report.scraped, 2);
        assert_eq!(report.forwarded, 1);
        assert_eq!(deliverer.sent.lock().unwrap().len(), 1);
    }
}
