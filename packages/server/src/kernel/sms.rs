// Twilio implementation of BaseSmsService
//
// Sends messages through the Twilio Messages REST API. The core only needs
// "fire and log": a delivery SID comes back, delivery-status callbacks are
// not consumed here.

use std::collections::HashMap;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::BaseSmsService;

#[derive(Debug, Clone)]
pub struct TwilioOptions {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    sid: String,
}

#[derive(Clone)]
pub struct TwilioSmsService {
    options: TwilioOptions,
    client: Client,
}

impl TwilioSmsService {
    pub fn new(options: TwilioOptions) -> Self {
        Self {
            options,
            client: Client::new(),
        }
    }
}

#[async_trait]
impl BaseSmsService for TwilioSmsService {
    async fn send(&self, to: &str, body: &str) -> Result<String> {
        let url = format!(
            "https://api.twilio.com/2010-04-01/Accounts/{}/Messages.json",
            self.options.account_sid
        );

        let mut form_body: HashMap<&str, &str> = HashMap::new();
        form_body.insert("To", to);
        form_body.insert("From", &self.options.from_number);
        form_body.insert("Body", body);

        let response = self
            .client
            .post(url)
            .basic_auth(
                &self.options.account_sid,
                Some(&self.options.auth_token),
            )
            .form(&form_body)
            .send()
            .await
            .context("Failed to send request to Twilio")?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            tracing::error!(
                status = %status,
                body = %error_body,
                to = %to,
                "Twilio rejected outbound message"
            );
            return Err(anyhow!("Twilio returned {}", status));
        }

        let message: MessageResponse = response
            .json()
            .await
            .context("Failed to parse Twilio message response")?;

        tracing::info!(sid = %message.sid, to = %to, "outbound SMS accepted");

        Ok(message.sid)
    }
}
