use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use epay_tools::{EpayApiError, RefreshPolicy, Token, TokenRefresher, TokenResponse, TokenSource, TokenStore};

/// An in-process OAuth server. Real sockets and a paused clock do not mix, so the refresher is driven through its
/// `TokenSource` seam here.
#[derive(Clone, Default)]
struct MockOAuth {
    issued: Arc<AtomicUsize>,
}

impl TokenSource for MockOAuth {
    async fn fetch_token(&self) -> Result<Token, EpayApiError> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let response: TokenResponse = serde_json::from_value(serde_json::json!({
            "scope": "payment",
            "expires_in": 120,
            "token_type": "Bearer",
            "access_token": format!("access-{n}"),
            "refresh_token": format!("refresh-{n}")
        }))
        .map_err(|e| EpayApiError::Decode(e.to_string()))?;
        Ok(Token::from_response(response))
    }
}

fn access_token(store: &TokenStore) -> String {
    store.valid_token().unwrap().access_token().reveal().clone()
}

#[tokio::test(start_paused = true)]
async fn token_rotates_after_61_simulated_seconds() {
    let _ = env_logger::try_init();
    let oauth = MockOAuth::default();
    let store = TokenStore::new();
    let handle = TokenRefresher::new(oauth.clone(), store.clone(), RefreshPolicy::default()).start().await.unwrap();

    let first = access_token(&store);
    assert!(!first.is_empty());
    assert_eq!(oauth.issued.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_secs(61)).await;
    assert_eq!(oauth.issued.load(Ordering::SeqCst), 2);
    let second = access_token(&store);
    assert_ne!(first, second);

    // One fetch per interval, never more
    tokio::time::sleep(Duration::from_secs(58)).await;
    assert_eq!(oauth.issued.load(Ordering::SeqCst), 2);
    handle.stop().await;
}

#[tokio::test(start_paused = true)]
async fn store_stays_valid_for_a_long_run() {
    let oauth = MockOAuth::default();
    let store = TokenStore::new();
    let handle = TokenRefresher::new(oauth.clone(), store.clone(), RefreshPolicy::default()).start().await.unwrap();
    for _ in 0..119 {
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert!(store.valid_token().is_ok());
    }
    // 833 seconds at one refresh per 60s, plus the initial fetch
    assert_eq!(oauth.issued.load(Ordering::SeqCst), 14);
    handle.stop().await;
}
