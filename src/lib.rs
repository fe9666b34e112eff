//! Mail client library: IMAP retrieval and flag management with automatic
//! reconnection, SMTP delivery with TLS policy selection, and a polling
//! stream of newly arrived messages.
//!
//! ```no_run
//! # async fn demo() -> email_courier::Result<()> {
//! use email_courier::{Client, Config, Filter};
//!
//! let config = Config::new("me@example.com", "app-password")
//!     .imap_server("imap.example.com")?
//!     .smtp_server("smtp.example.com:587")?;
//! let client = Client::connect(config).await?;
//! let unread = client.get(&Filter::default().limit(20).sort_desc(true)).await?;
//! println!("{} unread", unread.len());
//! client.close().await;
//! # Ok(())
//! # }
//! ```

pub mod address;
pub mod client;
pub mod config;
pub mod email;
pub mod error;
pub mod imap;
pub mod mime;
pub mod realtime;
pub mod smtp;

#[cfg(test)]
mod testing;

pub use address::ServerAddress;
pub use client::Client;
pub use config::{Config, Credentials};
pub use email::{Attachment, Email, SendOption};
pub use error::{Error, ErrorKind, Result};
pub use imap::{Filter, MailboxStatus};
pub use smtp::{ConnectionType, Mailer, TransportMode};
