use epay_common::MinorUnits;
use log::*;
use rsa::RsaPublicKey;

use crate::{
    api::EpayApi,
    config::EpayConfig,
    crypto::KeyCache,
    data_objects::{CardPayload, ChargeRequest, ChargeResponse, PaymentRequest, StatusResponse},
    refresher::{RefresherHandle, TokenRefresher},
    status::BusinessStatus,
    token::{Token, TokenStore},
    EpayApiError,
};

/// The result of a charge: what the processor said, and what that means for the business record.
#[derive(Debug, Clone)]
pub struct ChargeOutcome {
    pub response: ChargeResponse,
    pub status: BusinessStatus,
}

/// The processor adapter. Cheap to clone; clones share the token store and key cache.
///
/// A freshly constructed client has no token. Call [`EpayClient::start_token_refresher`] (or construct the client
/// with [`EpayClient::connect`]) before making payments; until then every payment call fails with
/// [`EpayApiError::TokenUnavailable`].
///
/// Charges are never retried here. A failed or timed-out charge may still have gone through on the processor side,
/// so any retry is the caller's call, keyed on the invoice id.
#[derive(Clone)]
pub struct EpayClient {
    api: EpayApi,
    store: TokenStore,
    keys: KeyCache,
}

impl EpayClient {
    pub fn new(config: EpayConfig) -> Result<Self, EpayApiError> {
        let ttl = config.key_cache_ttl;
        let api = EpayApi::new(config)?;
        let keys = KeyCache::new(api.clone(), ttl);
        Ok(Self { api, store: TokenStore::new(), keys })
    }

    /// Creates the client and starts its token refresher. Fails if the first token cannot be obtained.
    pub async fn connect(config: EpayConfig) -> Result<(Self, RefresherHandle), EpayApiError> {
        let client = Self::new(config)?;
        let handle = client.start_token_refresher().await?;
        Ok((client, handle))
    }

    /// Fetches the first token and spawns the background refresher. Start it once per client.
    pub async fn start_token_refresher(&self) -> Result<RefresherHandle, EpayApiError> {
        let policy = self.api.config().refresh;
        TokenRefresher::new(self.api.clone(), self.store.clone(), policy).start().await
    }

    pub fn config(&self) -> &EpayConfig {
        self.api.config()
    }

    pub fn token_store(&self) -> &TokenStore {
        &self.store
    }

    pub fn payment_page_url(&self) -> &str {
        &self.api.config().payment_page_url
    }

    /// Builds a payment request using the configured currency and terminal.
    pub fn payment_request(&self, invoice_id: &str, amount: MinorUnits) -> PaymentRequest {
        let config = self.api.config();
        PaymentRequest::new(invoice_id, amount, &config.currency, &config.terminal_id)
    }

    /// The current access token.
    pub fn get_token(&self) -> Result<String, EpayApiError> {
        self.store.valid_token().map(|t| t.access_token().reveal().clone())
    }

    /// Requests a token directly from the OAuth server, optionally scoped to a single invoice. The token is returned
    /// to the caller and is *not* installed in the token store.
    pub async fn fetch_payment_token(&self, request: Option<&PaymentRequest>) -> Result<Token, EpayApiError> {
        self.api.fetch_payment_token(request).await.map(Token::from_response)
    }

    pub async fn public_key(&self) -> Result<RsaPublicKey, EpayApiError> {
        self.keys.public_key().await
    }

    pub async fn pay(&self, request: &PaymentRequest) -> Result<ChargeOutcome, EpayApiError> {
        validate_request(request)?;
        let token = self.store.valid_token()?;
        let cryptogram = self.cryptogram(&request.terminal_id).await?;
        let merchant = &self.api.config().merchant;
        let charge = ChargeRequest {
            amount: request.amount.value(),
            currency: request.currency.clone(),
            name: merchant.name.clone(),
            cryptogram,
            invoice_id: request.invoice_id.clone(),
            invoice_id_alt: merchant.invoice_id_alt.clone(),
            description: merchant.description.clone(),
            account_id: merchant.account_id.clone(),
            email: merchant.email.clone(),
            phone: merchant.phone.clone(),
            card_save: merchant.card_save,
            data: merchant.data.clone(),
            post_link: merchant.post_link.clone(),
            failure_post_link: merchant.failure_post_link.clone(),
        };
        debug!("💳️ Charging {} {} for invoice {}", request.amount, request.currency, request.invoice_id);
        let response = self.api.charge(&token.bearer(), &charge).await.map_err(|e| {
            warn!("💳️ Charge for invoice {} failed. {e}", request.invoice_id);
            e
        })?;
        let status = response.status.business_status();
        info!(
            "💳️ Invoice {} charged. Transaction {} is {} ({status})",
            request.invoice_id, response.id, response.status
        );
        Ok(ChargeOutcome { response, status })
    }

    pub async fn get_status(&self, invoice_id: &str) -> Result<StatusResponse, EpayApiError> {
        if invoice_id.trim().is_empty() {
            return Err(EpayApiError::InvalidRequest("invoice id cannot be blank".to_string()));
        }
        let token = self.store.valid_token()?;
        debug!("🔎️ Checking status of invoice {invoice_id}");
        let status = self.api.transaction_status(&token.bearer(), invoice_id).await?;
        trace!("🔎️ Invoice {invoice_id}: {} {}", status.result_code, status.result_message);
        Ok(status)
    }

    async fn cryptogram(&self, terminal_id: &str) -> Result<String, EpayApiError> {
        let card = &self.api.config().card;
        trace!("🔐️ Encrypting card {} for terminal {terminal_id}", card.hpan.masked());
        let payload = CardPayload {
            hpan: card.hpan.reveal(),
            exp_date: card.exp_date.reveal(),
            cvc: card.cvc.reveal(),
            terminal_id,
        };
        let bytes = serde_json::to_vec(&payload).map_err(|e| EpayApiError::Encryption(e.to_string()))?;
        self.keys.encrypt(&bytes).await
    }
}

fn validate_request(request: &PaymentRequest) -> Result<(), EpayApiError> {
    if request.invoice_id.trim().is_empty() {
        return Err(EpayApiError::InvalidRequest("invoice id cannot be blank".to_string()));
    }
    if !request.amount.is_positive() {
        return Err(EpayApiError::InvalidRequest(format!("amount must be positive, got {}", request.amount)));
    }
    if request.currency.trim().is_empty() {
        return Err(EpayApiError::InvalidRequest("currency cannot be blank".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    fn offline_client() -> EpayClient {
        EpayClient::new(EpayConfig::new("http://127.0.0.1:9", "http://127.0.0.1:9", "test", "pw")).unwrap()
    }

    #[tokio::test]
    async fn payments_need_a_token() {
        let client = offline_client();
        assert!(matches!(client.get_token(), Err(EpayApiError::TokenUnavailable(_))));
        let req = client.payment_request("INV-1", MinorUnits::from(1000));
        assert_eq!(req.currency, "KZT");
        assert!(matches!(client.pay(&req).await, Err(EpayApiError::TokenUnavailable(_))));
        assert!(matches!(client.get_status("INV-1").await, Err(EpayApiError::TokenUnavailable(_))));
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected_before_any_io() {
        let client = offline_client();
        let req = client.payment_request(" ", MinorUnits::from(1000));
        assert!(matches!(client.pay(&req).await, Err(EpayApiError::InvalidRequest(_))));
        let req = client.payment_request("INV-1", MinorUnits::from(0));
        assert!(matches!(client.pay(&req).await, Err(EpayApiError::InvalidRequest(_))));
        assert!(matches!(client.get_status("").await, Err(EpayApiError::InvalidRequest(_))));
    }
}
