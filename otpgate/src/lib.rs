mod error;
mod page;

pub mod chat;
pub mod config;
pub mod insight;
pub mod message;
pub mod portal;
pub mod service;
pub mod storage;

pub use error::{Error, Result};
pub use page::Page;

/// User agent sent to the portal. The portal serves a reduced login page to
/// clients that do not look like a browser.
pub fn ua() -> String {
    format!(
        "Mozilla/5.0 (compatible; otpgate/{})",
        env!("CARGO_PKG_VERSION")
    )
}
