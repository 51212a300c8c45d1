use std::sync::Mutex;

use epay_tools::{CheckoutError, NewPayment, PaymentRecord, PaymentRecorder};

/// Keeps payment records in memory, numbering them from 1.
#[derive(Default)]
pub struct MemoryRecorder {
    records: Mutex<Vec<PaymentRecord>>,
}

impl MemoryRecorder {
    pub fn records(&self) -> Vec<PaymentRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl PaymentRecorder for MemoryRecorder {
    async fn record_payment(&self, payment: NewPayment) -> Result<PaymentRecord, CheckoutError> {
        let mut records = self.records.lock().unwrap();
        let record = PaymentRecord {
            id: (records.len() + 1).to_string(),
            user_id: payment.user_id,
            order_id: payment.order_id,
            amount: payment.amount,
            status: payment.status,
        };
        records.push(record.clone());
        Ok(record)
    }
}
