use crate::client::Client;
use crate::email::Email;
use crate::imap::Filter;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

const REALTIME_BUFFER: usize = 10;

impl Client {
    /// Polls `filter` every `interval` on a background task and streams the
    /// unread messages it finds. `filter.all` is ignored.
    ///
    /// Errors are logged and the next tick is attempted; the stream never
    /// ends on its own. The task stops once every receiver is dropped.
    pub fn get_realtime(
        self: &Arc<Self>,
        interval: Duration,
        filter: Filter,
    ) -> async_channel::Receiver<Email> {
        let (tx, rx) = async_channel::bounded(REALTIME_BUFFER);
        let client = Arc::clone(self);
        let filter = filter.all(false);
        tokio::spawn(async move {
            poll_loop(&client, interval, &filter, &tx).await;
        });
        rx
    }
}

async fn poll_loop(
    client: &Client,
    interval: Duration,
    filter: &Filter,
    tx: &async_channel::Sender<Email>,
) {
    loop {
        match client.get(filter).await {
            Ok(emails) => {
                for email in emails {
                    if tx.send(email).await.is_err() {
                        debug!("Realtime receiver dropped, stopping poller");
                        return;
                    }
                }
            }
            Err(e) => error!("Realtime fetch failed: {}", e),
        }

        if tx.is_closed() {
            debug!("Realtime receiver dropped, stopping poller");
            return;
        }
        tokio::time::sleep(interval).await;
    }
}
