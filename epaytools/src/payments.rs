use anyhow::{anyhow, Result};
use epay_common::MinorUnits;
use epay_tools::{crypto::max_payload_len, EpayClient};
use rsa::traits::PublicKeyParts;

use crate::PayParams;

pub fn print_token(client: &EpayClient) -> Result<()> {
    let token = client.token_store().valid_token()?;
    println!("----------------------------- Access Token -----------------------------");
    println!("Type:       {}", token.token_type());
    println!("Scope:      {}", token.scope());
    println!("Issued at:  {}", token.issued_at());
    println!("Expires in: {}s", token.expires_in().as_secs());
    println!("Token:      {}", token.access_token().reveal());
    println!("Refresh:    {}", token.refresh_token().masked());
    println!("------------------------------------------------------------------------");
    Ok(())
}

pub async fn print_public_key(client: &EpayClient) -> Result<()> {
    let key = client.public_key().await?;
    println!("----------------------------- Public Key -------------------------------");
    println!("Key size:            {} bits", key.size() * 8);
    println!("Max payload:         {} bytes", max_payload_len(&key));
    println!("Payment page:        {}", client.payment_page_url());
    println!("------------------------------------------------------------------------");
    Ok(())
}

pub async fn print_charge(client: &EpayClient, params: PayParams) -> Result<()> {
    let mut request = client.payment_request(&params.invoice_id, MinorUnits::from(params.amount));
    if let Some(currency) = params.currency {
        request.currency = currency;
    }
    let outcome = client.pay(&request).await?;
    let res = &outcome.response;
    println!("----------------------------- Charge -----------------------------------");
    println!("Invoice:          {}", request.invoice_id);
    println!("Transaction:      {}", res.id);
    println!("Amount:           {} {}", res.amount, res.currency);
    println!("Processor status: {}", res.status);
    println!("Payment status:   {}", outcome.status);
    println!("Approval code:    {}", res.approval_code);
    println!("3-D Secure:       {}", res.secure_3d.as_deref().unwrap_or("none"));
    println!("------------------------------------------------------------------------");
    Ok(())
}

pub async fn print_status(client: &EpayClient, invoice_id: &str) -> Result<()> {
    let status = client.get_status(invoice_id).await?;
    println!("----------------------------- Status -----------------------------------");
    println!("Result: {} {}", status.result_code, status.result_message);
    let tx = status.transaction.ok_or_else(|| anyhow!("No transaction found for invoice {invoice_id}"))?;
    let details = serde_json::json!({
        "id": tx.id,
        "invoice_id": tx.invoice_id,
        "created": tx.created_date.map(|d| d.to_rfc3339()),
        "amount": tx.amount,
        "currency": tx.currency,
        "card": tx.card_mask,
        "status_id": tx.status_id,
        "status": tx.status_name,
        "reason": tx.reason,
        "location": format!("{}, {}", tx.ip_city, tx.ip_country),
    });
    println!("{}", serde_json::to_string_pretty(&details)?);
    println!("------------------------------------------------------------------------");
    Ok(())
}
