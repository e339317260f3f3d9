//! Scrape client for the SMS portal.
//!
//! The portal has no API: every cycle logs in through the HTML form, walks
//! the received-SMS drill-down (date-range summary, group, phone number,
//! message cards) and returns the raw message texts. Requests are issued
//! strictly one after another. A failure below the summary level skips that
//! branch and keeps its siblings; only login, csrf and summary failures
//! abort the whole cycle.

pub mod page;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::{header::REFERER, Url};
use tracing::{debug, info, warn};

use crate::{
    config::{ClientConfig, PortalConfig},
    Error, Page, Result,
};
use page::{DashboardPage, LoginPage, NumbersPage, SmsPage, SummaryPage};

const RECEIVED_PATH: &str = "portal/sms/received/getsms";
const NUMBERS_PATH: &str = "portal/sms/received/getsms/number";
const NUMBER_SMS_PATH: &str = "portal/sms/received/getsms/number/sms";

/// Date format the portal expects in range fields.
const DATE_FORMAT: &str = "%m/%d/%Y";

/// One message card as scraped, before classification.
#[derive(Debug, Clone)]
pub struct RawSms {
    /// Group label, e.g. `"Pakistan 7364"`.
    pub group: String,
    pub number: String,
    pub text: String,
    pub at: DateTime<Utc>,
}

/// What one scrape cycle produced.
#[derive(Debug, Clone, Default)]
pub struct ScrapeOutcome {
    pub messages: Vec<RawSms>,
    /// Groups or numbers that failed and were skipped.
    pub failed_branches: usize,
}

/// Anything that can produce a cycle's worth of raw messages.
#[async_trait]
pub trait SmsSource: Send + Sync {
    async fn fetch_cycle(&self) -> Result<ScrapeOutcome>;
}

/// The real portal client. Holds configuration only; a fresh cookie session
/// is created for every cycle, starting from the login form.
pub struct PortalClient {
    portal: PortalConfig,
    client: ClientConfig,
}

/// An authenticated portal session.
struct Session {
    client: reqwest::Client,
    csrf: String,
    referer: String,
}

impl Session {
    async fn post_form(&self, url: Url, form: &[(&str, &str)]) -> Result<String> {
        let response = self
            .client
            .post(url)
            .header(REFERER, self.referer.clone())
            .form(form)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }
}

impl PortalClient {
    pub fn new(portal: PortalConfig, client: ClientConfig) -> Self {
        Self { portal, client }
    }

    async fn login(&self) -> Result<Session> {
        let client = self.client.build()?;

        let login_html = client
            .get(self.portal.login_url.clone())
            .send()
            .await?
            .text()
            .await?;
        let login_page = LoginPage::from_html(login_html)?;
        if login_page.token.is_none() {
            warn!("login form has no _token field, submitting without it");
        }

        let mut form = vec![
            ("email", self.portal.email.clone()),
            ("password", self.portal.password.clone()),
        ];
        if let Some(token) = login_page.token {
            form.push(("_token", token));
        }

        let response = client
            .post(self.portal.login_url.clone())
            .form(&form)
            .send()
            .await?;
        if response.url().as_str().to_lowercase().contains("login") {
            return Err(Error::LoginFailed);
        }

        let referer = response.url().to_string();
        let dashboard = DashboardPage::from_html(response.text().await?)?;
        debug!("portal login ok");

        Ok(Session {
            client,
            csrf: dashboard.csrf,
            referer,
        })
    }

    async fn scrape(&self) -> Result<ScrapeOutcome> {
        let session = self.login().await?;

        let now = Utc::now();
        let from = (now - chrono::Duration::days(1)).format(DATE_FORMAT).to_string();
        let to = now.format(DATE_FORMAT).to_string();

        let summary_html = session
            .post_form(
                self.portal.base_url.join(RECEIVED_PATH)?,
                &[("from", &from), ("to", &to), ("_token", &session.csrf)],
            )
            .await?;
        let summary = SummaryPage::from_html(summary_html)?;
        if summary.groups.is_empty() {
            info!("no sms groups in the current range");
            return Ok(ScrapeOutcome::default());
        }

        let mut outcome = ScrapeOutcome::default();
        for group in &summary.groups {
            if let Err(error) = self
                .fetch_group(&session, &from, &to, group, &mut outcome)
                .await
            {
                warn!(%group, %error, "skipping group");
                outcome.failed_branches += 1;
            }
        }

        Ok(outcome)
    }

    /// Fetch the phone numbers of one group and their messages. A failing
    /// number is counted and skipped; its siblings are still fetched.
    async fn fetch_group(
        &self,
        session: &Session,
        from: &str,
        to: &str,
        group: &str,
        outcome: &mut ScrapeOutcome,
    ) -> Result<()> {
        let numbers_html = session
            .post_form(
                self.portal.base_url.join(NUMBERS_PATH)?,
                &[
                    ("start", from),
                    ("end", to),
                    ("range", group),
                    ("_token", &session.csrf),
                ],
            )
            .await?;
        let numbers = NumbersPage::from_html(numbers_html)?;

        for number in &numbers.numbers {
            match self.fetch_number(session, from, to, group, number).await {
                Ok(mut messages) => outcome.messages.append(&mut messages),
                Err(error) => {
                    warn!(%group, %number, %error, "skipping number");
                    outcome.failed_branches += 1;
                }
            }
        }

        Ok(())
    }

    async fn fetch_number(
        &self,
        session: &Session,
        from: &str,
        to: &str,
        group: &str,
        number: &str,
    ) -> Result<Vec<RawSms>> {
        let sms_html = session
            .post_form(
                self.portal.base_url.join(NUMBER_SMS_PATH)?,
                &[
                    ("start", from),
                    ("end", to),
                    ("Number", number),
                    ("Range", group),
                    ("_token", &session.csrf),
                ],
            )
            .await?;
        let sms = SmsPage::from_html(sms_html)?;

        Ok(sms
            .texts
            .into_iter()
            .map(|text| RawSms {
                group: group.to_string(),
                number: number.to_string(),
                text,
                at: Utc::now(),
            })
            .collect())
    }
}

#[async_trait]
impl SmsSource for PortalClient {
    async fn fetch_cycle(&self) -> Result<ScrapeOutcome> {
        self.scrape().await
    }
}
