use std::{future::Future, time::Duration};

use log::*;
use tokio::{sync::oneshot, task::JoinHandle};

use crate::{api::EpayApi, config::RefreshPolicy, token::Token, token::TokenStore, EpayApiError};

/// Anything that can perform the client-credentials exchange.
pub trait TokenSource: Send + Sync + 'static {
    fn fetch_token(&self) -> impl Future<Output = Result<Token, EpayApiError>> + Send;
}

impl TokenSource for EpayApi {
    async fn fetch_token(&self) -> Result<Token, EpayApiError> {
        self.fetch_payment_token(None).await.map(Token::from_response)
    }
}

/// Keeps a [`TokenStore`] stocked with a live token. It is the only writer to the store it is given.
pub struct TokenRefresher<S> {
    source: S,
    store: TokenStore,
    policy: RefreshPolicy,
}

impl<S: TokenSource> TokenRefresher<S> {
    pub fn new(source: S, store: TokenStore, policy: RefreshPolicy) -> Self {
        Self { source, store, policy }
    }

    /// Fetches the first token and, if that works, spawns the background refresh task.
    ///
    /// Failure to get the first token is fatal: no payment can be made without one, so the error is handed straight
    /// back and nothing is spawned.
    pub async fn start(self) -> Result<RefresherHandle, EpayApiError> {
        let token = self.source.fetch_token().await.map_err(|e| {
            error!("🔑️ Could not obtain the initial access token. {e}");
            e
        })?;
        let delay = self.policy.next_refresh_delay(token.expires_in());
        info!("🔑️ Access token obtained. Next refresh in {}s", delay.as_secs());
        self.store.replace(token);
        let (stop, stop_signal) = oneshot::channel();
        let task = tokio::spawn(self.run(delay, stop_signal));
        Ok(RefresherHandle { stop: Some(stop), task })
    }

    async fn run(self, mut delay: Duration, mut stop_signal: oneshot::Receiver<()>) {
        let mut backoff = self.policy.initial_backoff();
        loop {
            let refresh = async {
                tokio::time::sleep(delay).await;
                self.source.fetch_token().await
            };
            let result = tokio::select! {
                biased;
                _ = &mut stop_signal => break,
                result = refresh => result,
            };
            delay = match result {
                Ok(token) => {
                    backoff = self.policy.initial_backoff();
                    let next = self.policy.next_refresh_delay(token.expires_in());
                    self.store.replace(token);
                    debug!("🔑️ Access token refreshed. Next refresh in {}s", next.as_secs());
                    next
                },
                Err(e) => {
                    let wait = backoff;
                    backoff = self.policy.next_backoff(backoff);
                    let expired = self.store.snapshot().map(|t| t.is_expired()).unwrap_or(true);
                    warn!(
                        "🔑️ Access token refresh failed. Retrying in {}s. Current token expired: {expired}. {e}",
                        wait.as_secs()
                    );
                    wait
                },
            };
        }
        debug!("🔑️ Token refresher stopped");
    }
}

/// Controls a running refresher. Dropping the handle also stops the task, at the next point it is polled.
pub struct RefresherHandle {
    stop: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl RefresherHandle {
    /// Signals the refresher to stop and waits for it to exit. An in-flight token request is abandoned.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Err(e) = (&mut self.task).await {
            warn!("🔑️ Token refresher did not shut down cleanly. {e}");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}
