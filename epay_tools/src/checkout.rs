//! Charging an order and handing the result to the payment repository.
//!
//! Storage is not this crate's business. [`PaymentRecorder`] is the seam through which the owning service persists
//! the business-level payment record once the processor has answered.
use epay_common::MinorUnits;
use log::*;
use serde::{Deserialize, Serialize};

use crate::{client::EpayClient, status::BusinessStatus, ChargeOutcome, CheckoutError};

/// An order as it arrives from the order service. Every field is optional on the wire, so validation happens here.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentOrder {
    pub user_id: Option<String>,
    pub order_id: Option<String>,
    pub amount: Option<String>,
}

impl PaymentOrder {
    pub fn new(user_id: &str, order_id: &str, amount: &str) -> Self {
        Self {
            user_id: Some(user_id.to_string()),
            order_id: Some(order_id.to_string()),
            amount: Some(amount.to_string()),
        }
    }

    fn validate(&self) -> Result<(String, String, MinorUnits), CheckoutError> {
        let user_id = non_blank(&self.user_id, "user_id")?;
        let order_id = non_blank(&self.order_id, "order_id")?;
        let amount = non_blank(&self.amount, "amount")?
            .parse::<MinorUnits>()
            .map_err(|e| CheckoutError::Validation(format!("amount: {e}")))?;
        Ok((user_id, order_id, amount))
    }
}

fn non_blank(value: &Option<String>, field: &str) -> Result<String, CheckoutError> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(CheckoutError::Validation(format!("{field}: cannot be blank"))),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPayment {
    pub user_id: String,
    pub order_id: String,
    pub amount: MinorUnits,
    pub status: BusinessStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub id: String,
    pub user_id: String,
    pub order_id: String,
    pub amount: MinorUnits,
    pub status: BusinessStatus,
}

/// Persists payment records on behalf of the checkout flow.
#[allow(async_fn_in_trait)]
pub trait PaymentRecorder {
    async fn record_payment(&self, payment: NewPayment) -> Result<PaymentRecord, CheckoutError>;
}

pub struct CheckoutService<R> {
    client: EpayClient,
    recorder: R,
}

impl<R: PaymentRecorder> CheckoutService<R> {
    pub fn new(client: EpayClient, recorder: R) -> Self {
        Self { client, recorder }
    }

    pub fn recorder(&self) -> &R {
        &self.recorder
    }

    /// Charges the order, using its order id as the invoice id, and records the outcome. A failed charge is returned
    /// as an error and nothing is recorded.
    pub async fn checkout(&self, order: &PaymentOrder) -> Result<(PaymentRecord, ChargeOutcome), CheckoutError> {
        let (user_id, order_id, amount) = order.validate()?;
        let request = self.client.payment_request(&order_id, amount);
        let outcome = self.client.pay(&request).await?;
        let payment = NewPayment { user_id, order_id, amount, status: outcome.status };
        let record = self.recorder.record_payment(payment).await.map_err(|e| {
            error!(
                "💳️ Transaction {} for order {} could not be recorded. {e}",
                outcome.response.id, request.invoice_id
            );
            e
        })?;
        info!("💳️ Payment {} recorded for order {} as {}", record.id, record.order_id, record.status);
        Ok((record, outcome))
    }
}
