use std::{sync::Arc, time::Duration};

use log::*;
use reqwest::{header::HeaderValue, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::{
    config::EpayConfig,
    data_objects::{from_processor_json, ChargeRequest, ChargeResponse, PaymentRequest, StatusResponse, TokenResponse},
    EpayApiError,
};

/// The body of an outgoing request.
pub enum RequestBody<'a, B: Serialize> {
    Json(&'a B),
    Form(&'a [(&'a str, String)]),
}

/// Thin wrapper over the processor's HTTP surface. Every call gets its own timeout, and any non-2xx answer is turned
/// into [`EpayApiError::ProcessorError`] with the full response body attached.
#[derive(Clone)]
pub struct EpayApi {
    config: Arc<EpayConfig>,
    base_url: Url,
    oauth_url: Url,
    client: Arc<Client>,
}

impl EpayApi {
    pub fn new(config: EpayConfig) -> Result<Self, EpayApiError> {
        let base_url = parse_base_url(&config.url)?;
        let oauth_url = parse_base_url(&config.oauth_url)?;
        let client = Client::builder()
            .user_agent(concat!("epay_tools/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| EpayApiError::Initialization(e.to_string()))?;
        Ok(Self { config: Arc::new(config), base_url, oauth_url, client: Arc::new(client) })
    }

    pub fn config(&self) -> &EpayConfig {
        &self.config
    }

    /// Sends the request and hands back the raw body of a successful response.
    pub async fn execute(&self, request: RequestBuilder, timeout: Duration) -> Result<String, EpayApiError> {
        let response = request.timeout(timeout).send().await.map_err(transport_error)?;
        let status = response.status();
        let body = response.text().await.map_err(transport_error)?;
        if status.is_success() {
            trace!("Processor call successful. {status}");
            Ok(body)
        } else {
            debug!("Processor call failed. {status}: {body}");
            Err(EpayApiError::ProcessorError { status: status.as_u16(), body })
        }
    }

    pub async fn rest_query<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        url: Url,
        bearer: Option<&str>,
        body: Option<RequestBody<'_, B>>,
        timeout: Duration,
    ) -> Result<T, EpayApiError> {
        trace!("Sending {method} {url}");
        let mut req = self.client.request(method, url);
        if let Some(token) = bearer {
            let value = HeaderValue::from_str(token).map_err(|e| EpayApiError::InvalidRequest(e.to_string()))?;
            req = req.header(reqwest::header::AUTHORIZATION, value);
        }
        req = match body {
            Some(RequestBody::Json(body)) => req.json(body),
            Some(RequestBody::Form(fields)) => req.form(fields),
            None => req.header(reqwest::header::CONTENT_TYPE, "application/json"),
        };
        let text = self.execute(req, timeout).await?;
        from_processor_json::<T>(&text).map_err(|e| EpayApiError::Decode(format!("{e}. Body: {text}")))
    }

    /// Performs the client-credentials grant. Passing a payment request scopes the token to that invoice.
    pub async fn fetch_payment_token(&self, request: Option<&PaymentRequest>) -> Result<TokenResponse, EpayApiError> {
        let url = endpoint(&self.oauth_url, &["oauth2", "token"])?;
        let mut fields = vec![
            ("client_id", self.config.login.clone()),
            ("client_secret", self.config.password.reveal().clone()),
            ("grant_type", "client_credentials".to_string()),
            ("scope", self.config.scope.clone()),
        ];
        if let Some(req) = request {
            fields.push(("invoiceID", req.invoice_id.clone()));
            fields.push(("amount", req.amount.to_string()));
            fields.push(("currency", req.currency.clone()));
            fields.push(("terminal", req.terminal_id.clone()));
        }
        debug!("🔑️ Requesting access token from {url}");
        self.rest_query::<TokenResponse, ()>(
            Method::POST,
            url,
            None,
            Some(RequestBody::Form(&fields)),
            self.config.auth_timeout,
        )
        .await
        .map_err(|e| match e {
            EpayApiError::Timeout(_) => e,
            e => EpayApiError::TokenFetch(e.to_string()),
        })
    }

    /// Fetches the PEM encoded public key the card payload must be encrypted with.
    pub async fn fetch_public_key_pem(&self) -> Result<String, EpayApiError> {
        let url = endpoint(&self.base_url, &["public.rsa"])?;
        debug!("🔐️ Fetching processor public key from {url}");
        let req = self.client.get(url);
        self.execute(req, self.config.auth_timeout).await.map_err(|e| match e {
            EpayApiError::Timeout(_) => e,
            e => EpayApiError::KeyFetch(e.to_string()),
        })
    }

    pub async fn charge(&self, bearer: &str, request: &ChargeRequest) -> Result<ChargeResponse, EpayApiError> {
        let url = endpoint(&self.base_url, &["payment", "cryptopay"])?;
        self.rest_query::<ChargeResponse, ChargeRequest>(
            Method::POST,
            url,
            Some(bearer),
            Some(RequestBody::Json(request)),
            self.config.request_timeout,
        )
        .await
    }

    pub async fn transaction_status(&self, bearer: &str, invoice_id: &str) -> Result<StatusResponse, EpayApiError> {
        let url = endpoint(&self.base_url, &["check-status", "payment", "transaction", invoice_id])?;
        self.rest_query::<StatusResponse, ()>(Method::GET, url, Some(bearer), None, self.config.request_timeout).await
    }
}

fn transport_error(e: reqwest::Error) -> EpayApiError {
    if e.is_timeout() {
        EpayApiError::Timeout(e.to_string())
    } else {
        EpayApiError::Transport(e.to_string())
    }
}

fn parse_base_url(url: &str) -> Result<Url, EpayApiError> {
    let parsed = Url::parse(url).map_err(|e| EpayApiError::InvalidUrl(format!("{url}. {e}")))?;
    if parsed.cannot_be_a_base() {
        return Err(EpayApiError::InvalidUrl(format!("{url} cannot be used as a base URL")));
    }
    Ok(parsed)
}

/// Appends path segments to a base URL. Segments are percent-encoded, so invoice ids cannot escape the path.
pub fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, EpayApiError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| EpayApiError::InvalidUrl(format!("{base} cannot be used as a base URL")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
