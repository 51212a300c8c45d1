//! Card payload encryption.
//!
//! The processor never receives card details in the clear. Instead, the card payload is encrypted with the RSA public
//! key the processor publishes at `{url}/public.rsa` (PKCS#1 v1.5 padding) and sent base64-encoded as the
//! `cryptogram` field of a charge.
//!
//! Fetching the key costs a round-trip, so [`KeyCache`] keeps it for a bounded time. A key that fails to parse is
//! never cached, and clears whatever was cached before it.
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use log::*;
use rand::{rngs::OsRng, CryptoRng, RngCore};
use rsa::{pkcs1::DecodeRsaPublicKey, pkcs8::DecodePublicKey, traits::PublicKeyParts, Pkcs1v15Encrypt, RsaPublicKey};
use tokio::time::Instant;

use crate::{api::EpayApi, EpayApiError};

/// Bytes of PKCS#1 v1.5 padding overhead. A key of `k` bytes can encrypt at most `k - 11` bytes of message.
pub const PKCS1_V15_OVERHEAD: usize = 11;

/// Parses a PEM encoded RSA public key. Both X.509 SubjectPublicKeyInfo (`PUBLIC KEY`) and PKCS#1 (`RSA PUBLIC KEY`)
/// encodings are accepted.
pub fn parse_public_key(pem: &str) -> Result<RsaPublicKey, EpayApiError> {
    let pem = pem.trim();
    if pem.starts_with("-----BEGIN RSA PUBLIC KEY-----") {
        RsaPublicKey::from_pkcs1_pem(pem).map_err(|e| EpayApiError::KeyParse(e.to_string()))
    } else {
        RsaPublicKey::from_public_key_pem(pem).map_err(|e| EpayApiError::KeyParse(e.to_string()))
    }
}

/// The largest payload the given key can encrypt.
pub fn max_payload_len(key: &RsaPublicKey) -> usize {
    key.size().saturating_sub(PKCS1_V15_OVERHEAD)
}

/// Encrypts `payload` with PKCS#1 v1.5 padding, drawing padding bytes from `rng`, and returns the ciphertext as
/// standard base64.
pub fn encrypt_payload_with_rng<R: CryptoRng + RngCore>(
    key: &RsaPublicKey,
    payload: &[u8],
    rng: &mut R,
) -> Result<String, EpayApiError> {
    let limit = max_payload_len(key);
    if payload.len() > limit {
        return Err(EpayApiError::Encryption(format!(
            "Payload is {} bytes, but a {}-bit key can encrypt at most {limit} bytes",
            payload.len(),
            key.size() * 8
        )));
    }
    let ciphertext =
        key.encrypt(rng, Pkcs1v15Encrypt, payload).map_err(|e| EpayApiError::Encryption(e.to_string()))?;
    Ok(base64::encode(ciphertext))
}

/// Encrypts `payload` using the operating system's secure random source for padding.
pub fn encrypt_payload(key: &RsaPublicKey, payload: &[u8]) -> Result<String, EpayApiError> {
    encrypt_payload_with_rng(key, payload, &mut OsRng)
}

struct CachedKey {
    key: RsaPublicKey,
    fetched_at: Instant,
}

#[derive(Clone)]
pub struct KeyCache {
    api: EpayApi,
    ttl: Duration,
    cached: Arc<Mutex<Option<CachedKey>>>,
}

impl KeyCache {
    /// A zero `ttl` disables caching, so every call fetches the key.
    pub fn new(api: EpayApi, ttl: Duration) -> Self {
        Self { api, ttl, cached: Arc::new(Mutex::new(None)) }
    }

    /// Returns the processor's public key, fetching it if the cached copy is missing or older than the TTL.
    pub async fn public_key(&self) -> Result<RsaPublicKey, EpayApiError> {
        if let Some(key) = self.fresh_key() {
            trace!("🔐️ Using cached processor public key");
            return Ok(key);
        }
        let pem = self.api.fetch_public_key_pem().await?;
        match parse_public_key(&pem) {
            Ok(key) => {
                debug!("🔐️ Fetched {}-bit processor public key", key.size() * 8);
                if !self.ttl.is_zero() {
                    let mut cached = self.cached.lock().unwrap_or_else(|p| p.into_inner());
                    *cached = Some(CachedKey { key: key.clone(), fetched_at: Instant::now() });
                }
                Ok(key)
            },
            Err(e) => {
                warn!("🔐️ Processor returned a public key that could not be parsed. {e}");
                self.invalidate();
                Err(e)
            },
        }
    }

    /// Fetches (or reuses) the public key and encrypts `payload` with it.
    pub async fn encrypt(&self, payload: &[u8]) -> Result<String, EpayApiError> {
        let key = self.public_key().await?;
        encrypt_payload(&key, payload)
    }

    pub fn invalidate(&self) {
        let mut cached = self.cached.lock().unwrap_or_else(|p| p.into_inner());
        if cached.take().is_some() {
            debug!("🔐️ Cached processor public key discarded");
        }
    }

    fn fresh_key(&self) -> Option<RsaPublicKey> {
        let cached = self.cached.lock().unwrap_or_else(|p| p.into_inner());
        cached.as_ref().filter(|c| c.fetched_at.elapsed() < self.ttl).map(|c| c.key.clone())
    }
}

#[cfg(test)]
mod test {
    use rsa::{pkcs8::DecodePrivateKey, RsaPrivateKey};

    use super::*;
    use crate::EpayConfig;

    const PUBLIC_KEY: &str = include_str!("../tests/fixtures/public_key.pem");
    const PUBLIC_KEY_PKCS1: &str = include_str!("../tests/fixtures/public_key_pkcs1.pem");
    const PRIVATE_KEY: &str = include_str!("../tests/fixtures/private_key.pem");

    fn decrypt(ciphertext: &str) -> Vec<u8> {
        let key = RsaPrivateKey::from_pkcs8_pem(PRIVATE_KEY).unwrap();
        let bytes = base64::decode(ciphertext).unwrap();
        key.decrypt(Pkcs1v15Encrypt, &bytes).unwrap()
    }

    #[test]
    fn parses_both_pem_encodings() {
        let spki = parse_public_key(PUBLIC_KEY).unwrap();
        let pkcs1 = parse_public_key(PUBLIC_KEY_PKCS1).unwrap();
        assert_eq!(spki, pkcs1);
        assert_eq!(spki.size(), 256);
        assert_eq!(max_payload_len(&spki), 245);
    }

    #[test]
    fn rejects_malformed_keys() {
        assert!(matches!(parse_public_key("not a key"), Err(EpayApiError::KeyParse(_))));
        let truncated = PUBLIC_KEY.replace("\n", "").chars().take(120).collect::<String>();
        assert!(matches!(parse_public_key(&truncated), Err(EpayApiError::KeyParse(_))));
        let garbage = "-----BEGIN PUBLIC KEY-----\nAAAA\n-----END PUBLIC KEY-----\n";
        assert!(matches!(parse_public_key(garbage), Err(EpayApiError::KeyParse(_))));
    }

    #[test]
    fn encrypt_then_decrypt() {
        let key = parse_public_key(PUBLIC_KEY).unwrap();
        let payload = br#"{"hpan":"4405639704015096","expDate":"0125","cvc":"815","terminalId":"67e34d63"}"#;
        let cryptogram = encrypt_payload(&key, payload).unwrap();
        assert_eq!(decrypt(&cryptogram), payload.to_vec());
        // Random padding means the same payload never encrypts to the same cryptogram twice
        assert_ne!(encrypt_payload(&key, payload).unwrap(), cryptogram);
    }

    fn cache(ttl: Duration) -> KeyCache {
        let api = EpayApi::new(EpayConfig::new("http://127.0.0.1:9", "http://127.0.0.1:9", "test", "pw")).unwrap();
        KeyCache::new(api, ttl)
    }

    fn store_key(cache: &KeyCache) {
        let key = parse_public_key(PUBLIC_KEY).unwrap();
        *cache.cached.lock().unwrap() = Some(CachedKey { key, fetched_at: Instant::now() });
    }

    #[tokio::test(start_paused = true)]
    async fn cached_keys_expire_after_the_ttl() {
        let cache = cache(Duration::from_secs(600));
        assert!(cache.fresh_key().is_none());
        store_key(&cache);
        assert!(cache.fresh_key().is_some());
        tokio::time::advance(Duration::from_secs(599)).await;
        assert!(cache.fresh_key().is_some());
        tokio::time::advance(Duration::from_secs(1)).await;
        assert!(cache.fresh_key().is_none());
        store_key(&cache);
        cache.invalidate();
        assert!(cache.fresh_key().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn zero_ttl_never_serves_from_the_cache() {
        let cache = cache(Duration::ZERO);
        store_key(&cache);
        assert!(cache.fresh_key().is_none());
    }

    #[test]
    fn payload_size_limit() {
        let key = parse_public_key(PUBLIC_KEY).unwrap();
        let at_limit = vec![b'x'; 245];
        let cryptogram = encrypt_payload(&key, &at_limit).unwrap();
        assert_eq!(decrypt(&cryptogram), at_limit);
        let too_big = vec![b'x'; 246];
        assert!(matches!(encrypt_payload(&key, &too_big), Err(EpayApiError::Encryption(_))));
    }
}
