use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

use epay_tools::EpayConfig;
use rsa::{pkcs8::DecodePrivateKey, Pkcs1v15Encrypt, RsaPrivateKey};
use serde_json::{json, Value};
use wiremock::{
    matchers::{header, method, path},
    Mock,
    MockServer,
    Request,
    Respond,
    ResponseTemplate,
};

pub const PUBLIC_KEY: &str = include_str!("../fixtures/public_key.pem");
pub const PRIVATE_KEY: &str = include_str!("../fixtures/private_key.pem");

pub const LOGIN: &str = "test";
pub const PASSWORD: &str = "yF587AV9Ms94qN2QShFzVR3vFnWkhjbAK3sG";

/// Issues `token-1`, `token-2`, ... on successive calls.
#[derive(Clone)]
pub struct RotatingTokens {
    pub calls: Arc<AtomicUsize>,
    pub expires_in: u64,
}

impl RotatingTokens {
    pub fn new(expires_in: u64) -> Self {
        Self { calls: Arc::new(AtomicUsize::new(0)), expires_in }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Respond for RotatingTokens {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        ResponseTemplate::new(200).set_body_json(json!({
            "scope": "webapi usermanagement email_send verification statement statistics payment",
            "expires_in": self.expires_in,
            "token_type": "Bearer",
            "access_token": format!("token-{n}"),
            "refresh_token": ""
        }))
    }
}

pub fn test_config(server: &MockServer) -> EpayConfig {
    EpayConfig::new(&server.uri(), &server.uri(), LOGIN, PASSWORD)
}

pub async fn mount_oauth(server: &MockServer, expires_in: u64) -> RotatingTokens {
    let tokens = RotatingTokens::new(expires_in);
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(tokens.clone())
        .mount(server)
        .await;
    tokens
}

pub async fn mount_public_key(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/public.rsa"))
        .respond_with(ResponseTemplate::new(200).set_body_string(PUBLIC_KEY))
        .mount(server)
        .await;
}

pub fn charge_response(id: &str, status: &str) -> Value {
    json!({
        "id": id,
        "accountId": "uuid000001",
        "amount": 1000,
        "amountBonus": 0,
        "currency": "KZT",
        "description": "test payment",
        "email": "jj@example.com",
        "invoiceID": "INV-1",
        "language": "rus",
        "phone": "77777777777",
        "reference": "207215558229",
        "intReference": "7SBN0B3KTKMJLRC4",
        "secure3D": null,
        "cardID": "d9c8e3f3-6f3b-4ad6-8b1e-4a6b1b1e1f11",
        "fee": 0,
        "approvalCode": "178644",
        "code": 0,
        "status": status,
        "secure3DStatus": ""
    })
}

/// A 200 answer to a charge, carrying the given transaction id and processor status.
pub fn charged(id: &str, status: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(charge_response(id, status))
}

pub async fn mount_charge(server: &MockServer, response: ResponseTemplate) {
    Mock::given(method("POST")).and(path("/payment/cryptopay")).respond_with(response).mount(server).await;
}

/// Every request the mock server received on the given path.
pub async fn requests_to(server: &MockServer, url_path: &str) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == url_path)
        .collect()
}

pub fn decrypt_cryptogram(cryptogram: &str) -> Value {
    let key = RsaPrivateKey::from_pkcs8_pem(PRIVATE_KEY).unwrap();
    let ciphertext = base64::decode(cryptogram).unwrap();
    let plaintext = key.decrypt(Pkcs1v15Encrypt, &ciphertext).unwrap();
    serde_json::from_slice(&plaintext).unwrap()
}
