//! # Epay processor adapter
//!
//! Talks to the Epay card-payment processor on behalf of the payment service:
//! * keeps an OAuth2 client-credentials token fresh in the background ([`TokenRefresher`], [`TokenStore`]),
//! * encrypts the card payload with the processor's RSA key ([`crypto`]),
//! * submits charges and maps the processor's verdict onto a [`BusinessStatus`] ([`EpayClient::pay`]),
//! * looks up transaction status for reconciliation ([`EpayClient::get_status`]).
//!
//! Configuration comes from [`EpayConfig`], either built explicitly or read from `EPAY_*` environment variables.
mod api;
mod checkout;
mod client;
mod config;
pub mod crypto;
mod data_objects;
mod error;
mod refresher;
mod status;
mod token;

pub use api::{endpoint, EpayApi, RequestBody};
pub use checkout::{CheckoutService, NewPayment, PaymentOrder, PaymentRecord, PaymentRecorder};
pub use client::{ChargeOutcome, EpayClient};
pub use config::{CardDetails, EpayConfig, MerchantProfile, RefreshPolicy, MIN_SAFETY_MARGIN};
pub use data_objects::{
    CardPayload,
    ChargeRequest,
    ChargeResponse,
    PaymentRequest,
    StatusResponse,
    TokenResponse,
    TransactionDetails,
    MAX_TOKEN_LIFETIME_SECS,
};
pub use error::{CheckoutError, EpayApiError};
pub use refresher::{RefresherHandle, TokenRefresher, TokenSource};
pub use status::{BusinessStatus, ProcessorStatus};
pub use token::{Token, TokenStore};
