use chrono::{DateTime, Utc};
use epay_common::MinorUnits;
use serde::{de, de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::status::ProcessorStatus;

/// What a collaborator asks the processor to charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    pub amount: MinorUnits,
    pub currency: String,
    pub invoice_id: String,
    pub terminal_id: String,
}

impl PaymentRequest {
    pub fn new(invoice_id: &str, amount: MinorUnits, currency: &str, terminal_id: &str) -> Self {
        Self {
            amount,
            currency: currency.to_string(),
            invoice_id: invoice_id.to_string(),
            terminal_id: terminal_id.to_string(),
        }
    }
}

/// Decodes a processor response body. The processor sends `null` for informational fields it has no value for, so
/// null members are dropped before decoding and the affected fields take their defaults.
pub fn from_processor_json<T: DeserializeOwned>(text: &str) -> serde_json::Result<T> {
    let mut value = serde_json::from_str::<Value>(text)?;
    drop_nulls(&mut value);
    serde_json::from_value(value)
}

fn drop_nulls(value: &mut Value) {
    match value {
        Value::Object(members) => {
            members.retain(|_, v| !v.is_null());
            members.values_mut().for_each(drop_nulls);
        },
        Value::Array(items) => items.iter_mut().for_each(drop_nulls),
        _ => {},
    }
}

//--------------------------------------------------  OAuth  ----------------------------------------------------------
/// The longest token lifetime that is accepted from the OAuth server. Anything longer is treated as a malformed
/// response.
pub const MAX_TOKEN_LIFETIME_SECS: u64 = 366 * 24 * 60 * 60;

#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub scope: String,
    /// Lifetime of the token in seconds. The processor has been seen sending this as a number and as a string.
    #[serde(deserialize_with = "deserialize_seconds")]
    pub expires_in: u64,
    #[serde(default)]
    pub token_type: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: String,
}

fn deserialize_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let seconds = match &value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(whole_seconds)),
        Value::String(s) => s.trim().parse::<f64>().ok().and_then(whole_seconds),
        _ => None,
    };
    seconds
        .filter(|s| *s <= MAX_TOKEN_LIFETIME_SECS)
        .ok_or_else(|| de::Error::custom(format!("invalid expires_in: {value}")))
}

fn whole_seconds(f: f64) -> Option<u64> {
    (f.is_finite() && f >= 0.0 && f <= MAX_TOKEN_LIFETIME_SECS as f64).then(|| f.trunc() as u64)
}

//--------------------------------------------------  Charges  --------------------------------------------------------
/// The card data that gets encrypted into the cryptogram. Field order and names are fixed by the processor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CardPayload<'a> {
    pub hpan: &'a str,
    pub exp_date: &'a str,
    pub cvc: &'a str,
    pub terminal_id: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChargeRequest {
    pub amount: i64,
    pub currency: String,
    pub name: String,
    pub cryptogram: String,
    pub invoice_id: String,
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

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ChargeResponse {
    pub id: String,
    pub account_id: String,
    pub amount: f64,
    pub amount_bonus: f64,
    pub currency: String,
    pub description: String,
    pub email: String,
    #[serde(rename = "invoiceID")]
    pub invoice_id: String,
    pub language: String,
    pub phone: String,
    pub reference: String,
    pub int_reference: String,
    #[serde(rename = "secure3D")]
    pub secure_3d: Option<String>,
    pub fingerprint: Option<String>,
    #[serde(rename = "cardID")]
    pub card_id: String,
    pub fee: f64,
    pub approval_code: String,
    pub code: i64,
    pub status: ProcessorStatus,
    #[serde(rename = "secure3DStatus")]
    pub secure_3d_status: String,
}

//--------------------------------------------------  Status  ---------------------------------------------------------
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StatusResponse {
    pub result_code: String,
    pub result_message: String,
    pub transaction: Option<TransactionDetails>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionDetails {
    pub id: String,
    pub created_date: Option<DateTime<Utc>>,
    #[serde(rename = "invoiceID")]
    pub invoice_id: String,
    pub amount: f64,
    pub amount_bonus: f64,
    pub org_amount: f64,
    pub approval_code: String,
    pub payout_amount: f64,
    pub currency: String,
    pub terminal: String,
    #[serde(rename = "accountID")]
    pub account_id: String,
    pub description: String,
    pub data: String,
    pub language: String,
    pub card_mask: String,
    pub card_type: String,
    pub issuer: String,
    pub reference: String,
    pub reason: String,
    pub reason_code: String,
    pub int_reference: String,
    pub secure: bool,
    #[serde(rename = "statusID")]
    pub status_id: String,
    pub status_name: String,
    pub status_description: String,
    pub name: String,
    pub email: String,
    pub phone: String,
    #[serde(rename = "cardID")]
    pub card_id: String,
    #[serde(rename = "xlsRRN")]
    pub xls_rrn: String,
    pub ip: String,
    pub ip_country: String,
    pub ip_city: String,
    pub ip_region: String,
    pub ip_district: String,
    pub ip_latitude: f64,
    pub ip_longitude: f64,
}
