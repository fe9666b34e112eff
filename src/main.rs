// Email Courier - IMAP/SMTP mail client
// Copyright (C) 2026  Asa V. Schaeffer
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

use clap::{Parser, Subcommand};
use email_courier::{Client, Config, Email, Filter, SendOption};
use mimalloc::MiMalloc;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Reads and sends mail for the account configured through `EMAIL_ADDRESS`,
/// `EMAIL_PASSWORD`, `IMAP_SERVER`, `SMTP_SERVER` and `SMTP_CONNECTION_TYPE`.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Args)]
struct FetchArgs {
    /// Maximum number of messages, 0 for no limit
    #[arg(short, long, default_value_t = 0)]
    limit: usize,
    /// Include messages that were already read
    #[arg(short, long)]
    all: bool,
    /// Mark returned messages as read
    #[arg(long)]
    mark_read: bool,
    /// Newest messages first when the limit applies
    #[arg(long)]
    desc: bool,
    #[arg(short, long, default_value = "INBOX")]
    mailbox: String,
}

impl FetchArgs {
    fn filter(&self) -> Filter {
        Filter::default()
            .limit(self.limit)
            .all(self.all)
            .mark_read(self.mark_read)
            .sort_desc(self.desc)
            .mailbox(self.mailbox.clone())
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print matching messages
    Fetch(FetchArgs),
    /// Poll for unread messages and print them as they arrive
    Watch {
        /// Seconds between polls
        #[arg(short, long, default_value_t = 30)]
        interval: u64,
        #[command(flatten)]
        fetch: FetchArgs,
    },
    /// Send a single-part message
    Send {
        #[arg(long, required = true)]
        to: Vec<String>,
        #[arg(short, long)]
        subject: String,
        #[arg(short, long)]
        body: String,
        #[arg(long)]
        cc: Vec<String>,
        #[arg(long)]
        bcc: Vec<String>,
        #[arg(long)]
        html: bool,
    },
    /// Flag messages as deleted (expunged by the next mark-read/mark-unread)
    Delete(UidArgs),
    MarkRead(UidArgs),
    MarkUnread(UidArgs),
}

#[derive(Debug, clap::Args)]
struct UidArgs {
    #[arg(required = true)]
    uids: Vec<u32>,
    #[arg(short, long, default_value = "INBOX")]
    mailbox: String,
}

fn print_email(email: &Email) {
    println!(
        "[{}] {} | {} | {}",
        email.uid,
        email
            .date
            .map(|d| d.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default(),
        email.from.join(", "),
        email.subject
    );
    for attachment in &email.attachments {
        println!("    attachment: {} ({} bytes)", attachment.name, attachment.body.len());
    }
}

async fn run(cli: Cli) -> email_courier::Result<()> {
    let config = Config::from_env()?;
    let client = Arc::new(Client::connect(config).await?);

    match cli.command {
        Command::Fetch(args) => {
            for email in client.get(&args.filter()).await? {
                print_email(&email);
            }
        }
        Command::Watch { interval, fetch } => {
            let rx = client.get_realtime(Duration::from_secs(interval), fetch.filter());
            while let Ok(email) = rx.recv().await {
                print_email(&email);
            }
        }
        Command::Send {
            to,
            subject,
            body,
            cc,
            bcc,
            html,
        } => {
            let opt = SendOption::default().cc(cc).bcc(bcc).html(html);
            client.send(&to, &subject, body.as_bytes(), &opt).await?;
        }
        Command::Delete(args) => {
            client.select_mailbox(&args.mailbox, false).await?;
            client.delete(&args.uids).await?;
        }
        Command::MarkRead(args) => {
            client.select_mailbox(&args.mailbox, false).await?;
            client.mark_read(&args.uids).await?;
        }
        Command::MarkUnread(args) => {
            client.select_mailbox(&args.mailbox, false).await?;
            client.mark_unread(&args.uids).await?;
        }
    }

    client.close().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
