use std::{env, time::Duration};

use epay_common::{
    helpers::{parse_boolean_flag, parse_seconds},
    Secret,
    DEFAULT_CURRENCY_CODE,
};
use log::*;

const DEFAULT_EPAY_URL: &str = "https://testepay.homebank.kz/api";
const DEFAULT_OAUTH_URL: &str = "https://testoauth.homebank.kz/epay2";
const DEFAULT_PAYMENT_PAGE_URL: &str = "https://test-epay.homebank.kz/payform/payment-api.js";
const DEFAULT_SCOPE: &str = "webapi usermanagement email_send verification statement statistics payment";
const DEFAULT_TERMINAL_ID: &str = "67e34d63-102f-4bd1-898e-370781d0074d";
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_AUTH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_KEY_CACHE_TTL_SECS: u64 = 600;

/// The smallest safety margin the refresher will accept between a token refresh and that token's expiry.
pub const MIN_SAFETY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct EpayConfig {
    /// Base URL of the processor API, e.g. "https://testepay.homebank.kz/api"
    pub url: String,
    /// Base URL of the OAuth server. The token endpoint is `{oauth_url}/oauth2/token`.
    pub oauth_url: String,
    /// OAuth client id
    pub login: String,
    /// OAuth client secret
    pub password: Secret<String>,
    /// Hosted payment page, handed to collaborators that redirect customers instead of charging directly.
    pub payment_page_url: String,
    pub scope: String,
    pub terminal_id: String,
    pub currency: String,
    pub card: CardDetails,
    pub merchant: MerchantProfile,
    /// Timeout for charge and status calls.
    pub request_timeout: Duration,
    /// Timeout for token and public key calls.
    pub auth_timeout: Duration,
    pub key_cache_ttl: Duration,
    pub refresh: RefreshPolicy,
}

impl Default for EpayConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_EPAY_URL.to_string(),
            oauth_url: DEFAULT_OAUTH_URL.to_string(),
            login: String::default(),
            password: Secret::default(),
            payment_page_url: DEFAULT_PAYMENT_PAGE_URL.to_string(),
            scope: DEFAULT_SCOPE.to_string(),
            terminal_id: DEFAULT_TERMINAL_ID.to_string(),
            currency: DEFAULT_CURRENCY_CODE.to_string(),
            card: CardDetails::default(),
            merchant: MerchantProfile::default(),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            auth_timeout: Duration::from_secs(DEFAULT_AUTH_TIMEOUT_SECS),
            key_cache_ttl: Duration::from_secs(DEFAULT_KEY_CACHE_TTL_SECS),
            refresh: RefreshPolicy::default(),
        }
    }
}

impl EpayConfig {
    pub fn new(url: &str, oauth_url: &str, login: &str, password: &str) -> Self {
        Self {
            url: url.to_string(),
            oauth_url: oauth_url.to_string(),
            login: login.to_string(),
            password: Secret::new(password.to_string()),
            ..Default::default()
        }
    }

    pub fn new_from_env_or_default() -> Self {
        let url = env::var("EPAY_URL").unwrap_or_else(|_| {
            warn!("🪛️ EPAY_URL not set, using the test environment, {DEFAULT_EPAY_URL}");
            DEFAULT_EPAY_URL.to_string()
        });
        let oauth_url = env::var("EPAY_OAUTH_URL").unwrap_or_else(|_| {
            warn!("🪛️ EPAY_OAUTH_URL not set, using the test environment, {DEFAULT_OAUTH_URL}");
            DEFAULT_OAUTH_URL.to_string()
        });
        let login = env::var("EPAY_LOGIN").unwrap_or_else(|_| {
            error!("🪛️ EPAY_LOGIN is not set. Please set it to the client id issued by the processor.");
            String::default()
        });
        let password = Secret::new(env::var("EPAY_PASSWORD").unwrap_or_else(|_| {
            error!("🪛️ EPAY_PASSWORD is not set. Please set it to the client secret issued by the processor.");
            String::default()
        }));
        let payment_page_url = env::var("EPAY_PAYMENT_PAGE_URL").unwrap_or_else(|_| {
            warn!("🪛️ EPAY_PAYMENT_PAGE_URL not set, using {DEFAULT_PAYMENT_PAGE_URL}");
            DEFAULT_PAYMENT_PAGE_URL.to_string()
        });
        let scope = env::var("EPAY_SCOPE").unwrap_or_else(|_| DEFAULT_SCOPE.to_string());
        let terminal_id = env::var("EPAY_TERMINAL_ID").unwrap_or_else(|_| {
            warn!("🪛️ EPAY_TERMINAL_ID not set, using the test terminal, {DEFAULT_TERMINAL_ID}");
            DEFAULT_TERMINAL_ID.to_string()
        });
        let currency = env::var("EPAY_CURRENCY").unwrap_or_else(|_| DEFAULT_CURRENCY_CODE.to_string());
        let request_timeout = Duration::from_secs(parse_seconds(
            env::var("EPAY_REQUEST_TIMEOUT_SECS").ok(),
            DEFAULT_REQUEST_TIMEOUT_SECS,
        ));
        let auth_timeout =
            Duration::from_secs(parse_seconds(env::var("EPAY_AUTH_TIMEOUT_SECS").ok(), DEFAULT_AUTH_TIMEOUT_SECS));
        let key_cache_ttl =
            Duration::from_secs(parse_seconds(env::var("EPAY_KEY_CACHE_TTL_SECS").ok(), DEFAULT_KEY_CACHE_TTL_SECS));
        Self {
            url,
            oauth_url,
            login,
            password,
            payment_page_url,
            scope,
            terminal_id,
            currency,
            card: CardDetails::from_env_or_default(),
            merchant: MerchantProfile::from_env_or_default(),
            request_timeout,
            auth_timeout,
            key_cache_ttl,
            refresh: RefreshPolicy::default(),
        }
    }
}

//-------------------------------------------------  CardDetails  ------------------------------------------------------
/// The card that is encrypted into the cryptogram of every charge.
#[derive(Debug, Clone)]
pub struct CardDetails {
    pub hpan: Secret<String>,
    /// MMYY
    pub exp_date: Secret<String>,
    pub cvc: Secret<String>,
}

impl Default for CardDetails {
    /// The processor's published test card.
    fn default() -> Self {
        Self {
            hpan: Secret::new("4405639704015096".to_string()),
            exp_date: Secret::new("0125".to_string()),
            cvc: Secret::new("815".to_string()),
        }
    }
}

impl CardDetails {
    pub fn from_env_or_default() -> Self {
        let default = Self::default();
        match (env::var("EPAY_CARD_HPAN"), env::var("EPAY_CARD_EXP_DATE"), env::var("EPAY_CARD_CVC")) {
            (Ok(hpan), Ok(exp_date), Ok(cvc)) => {
                Self { hpan: Secret::new(hpan), exp_date: Secret::new(exp_date), cvc: Secret::new(cvc) }
            },
            _ => {
                warn!("🪛️ EPAY_CARD_HPAN, EPAY_CARD_EXP_DATE or EPAY_CARD_CVC is not set. Using the test card");
                default
            },
        }
    }
}

//-------------------------------------------------  MerchantProfile  --------------------------------------------------
/// Fixed merchant and customer metadata that accompanies every charge request.
#[derive(Debug, Clone)]
pub struct MerchantProfile {
    pub name: String,
    pub invoice_id_alt: String,
    pub description: String,
    pub account_id: String,
    pub email: String,
    pub phone: String,
    pub card_save: bool,
    pub data: String,
    pub post_link: String,
    pub failure_post_link: String,
}

impl Default for MerchantProfile {
    fn default() -> Self {
        Self {
            name: "JON JONSON".to_string(),
            invoice_id_alt: "1".to_string(),
            description: "test payment".to_string(),
            account_id: "uuid000001".to_string(),
            email: "jj@example.com".to_string(),
            phone: "77777777777".to_string(),
            card_save: true,
            data: r#"{"statement":{"name":"Arman Ali","invoiceID":"80000016"}}"#.to_string(),
            post_link: "https://testmerchant/order/1123".to_string(),
            failure_post_link: "https://testmerchant/order/1123/fail".to_string(),
        }
    }
}

impl MerchantProfile {
    pub fn from_env_or_default() -> Self {
        let default = Self::default();
        Self {
            name: env::var("EPAY_MERCHANT_NAME").unwrap_or(default.name),
            invoice_id_alt: env::var("EPAY_MERCHANT_INVOICE_ID_ALT").unwrap_or(default.invoice_id_alt),
            description: env::var("EPAY_MERCHANT_DESCRIPTION").unwrap_or(default.description),
            account_id: env::var("EPAY_MERCHANT_ACCOUNT_ID").unwrap_or(default.account_id),
            email: env::var("EPAY_MERCHANT_EMAIL").unwrap_or(default.email),
            phone: env::var("EPAY_MERCHANT_PHONE").unwrap_or(default.phone),
            card_save: parse_boolean_flag(env::var("EPAY_MERCHANT_CARD_SAVE").ok(), default.card_save),
            data: env::var("EPAY_MERCHANT_DATA").unwrap_or(default.data),
            post_link: env::var("EPAY_MERCHANT_POST_LINK").unwrap_or(default.post_link),
            failure_post_link: env::var("EPAY_MERCHANT_FAILURE_POST_LINK").unwrap_or(default.failure_post_link),
        }
    }
}

//-------------------------------------------------  RefreshPolicy  ----------------------------------------------------
/// Timing rules for the background token refresher.
#[derive(Debug, Clone, Copy)]
pub struct RefreshPolicy {
    safety_margin: Duration,
    min_delay: Duration,
    initial_backoff: Duration,
    max_backoff: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            safety_margin: MIN_SAFETY_MARGIN,
            min_delay: Duration::from_secs(1),
            initial_backoff: Duration::from_secs(5),
            max_backoff: Duration::from_secs(60),
        }
    }
}

impl RefreshPolicy {
    /// The safety margin is raised to [`MIN_SAFETY_MARGIN`] if a smaller one is given, and the backoff cap is never
    /// lower than the initial backoff.
    pub fn new(safety_margin: Duration, initial_backoff: Duration, max_backoff: Duration) -> Self {
        Self {
            safety_margin: safety_margin.max(MIN_SAFETY_MARGIN),
            initial_backoff,
            max_backoff: max_backoff.max(initial_backoff),
            ..Default::default()
        }
    }

    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    /// How long to wait before refreshing a token that was just issued with the given lifetime.
    pub fn next_refresh_delay(&self, expires_in: Duration) -> Duration {
        expires_in.saturating_sub(self.safety_margin).max(self.min_delay)
    }

    /// The backoff to use after another failure, given the backoff that was just waited out.
    pub fn next_backoff(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max_backoff)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn refresh_delay_respects_safety_margin() {
        let policy = RefreshPolicy::default();
        assert_eq!(policy.next_refresh_delay(Duration::from_secs(3600)), Duration::from_secs(3540));
        assert_eq!(policy.next_refresh_delay(Duration::from_secs(120)), Duration::from_secs(60));
        assert_eq!(policy.next_refresh_delay(Duration::from_secs(30)), Duration::from_secs(1));
        assert_eq!(policy.next_refresh_delay(Duration::ZERO), Duration::from_secs(1));
    }

    #[test]
    fn backoff_is_capped() {
        let policy = RefreshPolicy::default();
        let mut backoff = policy.initial_backoff();
        let mut seen = vec![];
        for _ in 0..6 {
            seen.push(backoff.as_secs());
            backoff = policy.next_backoff(backoff);
        }
        assert_eq!(seen, vec![5, 10, 20, 40, 60, 60]);
    }

    #[test]
    fn safety_margin_has_a_floor() {
        let policy = RefreshPolicy::new(Duration::from_secs(5), Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(policy.safety_margin(), MIN_SAFETY_MARGIN);
        assert_eq!(policy.next_backoff(Duration::from_secs(5)), Duration::from_secs(5));
    }
}
