use regex::Regex;

use crate::{Error, Page};

/// The received-SMS summary for a date range. Each group element embeds its
/// identifier in an inline click handler rather than a proper attribute, so
/// it has to be mined with a regex.
#[derive(Debug)]
pub struct SummaryPage {
    pub groups: Vec<String>,
}

impl Page for SummaryPage {
    fn from_document(document: kuchikiki::NodeRef) -> Result<Self, Error> {
        let pattern = Regex::new(r"getDetials\('(.+?)'\)").unwrap();

        let mut groups = Vec::new();
        for node in document
            .select("div.pointer")
            .map_err(|_| Error::KuchikiError)?
        {
            if let Some(onclick) = node.attributes.borrow().get("onclick") {
                if let Some(capture) = pattern.captures(onclick) {
                    groups.push(capture[1].to_owned());
                }
            }
        }

        Ok(Self { groups })
    }
}

/// The phone numbers of one group.
#[derive(Debug)]
pub struct NumbersPage {
    pub numbers: Vec<String>,
}

impl Page for NumbersPage {
    fn from_document(document: kuchikiki::NodeRef) -> Result<Self, Error> {
        let mut numbers = Vec::new();
        for node in document
            .select("div[onclick*='getDetialsNumber']")
            .map_err(|_| Error::KuchikiError)?
        {
            let number = node.as_node().text_contents().trim().to_owned();
            if !number.is_empty() {
                numbers.push(number);
            }
        }

        Ok(Self { numbers })
    }
}

/// The message cards of one phone number.
#[derive(Debug)]
pub struct SmsPage {
    pub texts: Vec<String>,
}

impl Page for SmsPage {
    fn from_document(document: kuchikiki::NodeRef) -> Result<Self, Error> {
        let mut texts = Vec::new();
        for card in document
            .select("div.card-body")
            .map_err(|_| Error::KuchikiError)?
        {
            // cards without a text block are decoration
            if let Ok(body) = card.as_node().select_first("p.mb-0") {
                let text = body.as_node().text_contents().trim().to_owned();
                if !text.is_empty() {
                    texts.push(text);
                }
            }
        }

        Ok(Self { texts })
    }
}
