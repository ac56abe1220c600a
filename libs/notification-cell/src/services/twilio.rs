use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, error, info};

use shared_config::AppConfig;
use shared_models::PatientId;

use crate::error::NotificationError;
use crate::messages::render;
use crate::models::{DeliveryReceipt, NotificationKind, NotificationPayload};
use crate::services::notifier::Notifier;

/// Normalises a contact to Twilio's `whatsapp:+<digits>` form.
pub fn whatsapp_address(contact: &str) -> String {
    let contact = contact.trim();
    let number = contact
        .strip_prefix("whatsapp:")
        .unwrap_or(contact)
        .trim()
        .trim_start_matches('+')
        .replace(' ', "");
    format!("whatsapp:+{}", number)
}

#[derive(Debug, Deserialize)]
struct MessageResource {
    sid: String,
}

/// Sends WhatsApp messages through the Twilio Messages API.
pub struct TwilioWhatsAppNotifier {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    from: String,
}

impl TwilioWhatsAppNotifier {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.twilio_api_base_url.trim_end_matches('/').to_string(),
            account_sid: config.twilio_account_sid.clone(),
            auth_token: config.twilio_auth_token.clone(),
            from: whatsapp_address(&config.twilio_whatsapp_from),
        }
    }

    fn messages_url(&self) -> String {
        format!("{}/2010-04-01/Accounts/{}/Messages.json", self.base_url, self.account_sid)
    }

    pub async fn send_text(&self, to: &str, body: &str) -> Result<DeliveryReceipt, NotificationError> {
        if self.account_sid.is_empty() || self.auth_token.is_empty() {
            return Err(NotificationError::NotConfigured("missing Twilio credentials".to_string()));
        }
        if to.trim().is_empty() {
            return Err(NotificationError::InvalidRecipient(to.to_string()));
        }

        let to = whatsapp_address(to);
        let url = self.messages_url();
        debug!("Sending WhatsApp message to {} via {}", to, url);

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("From", self.from.as_str()), ("To", to.as_str()), ("Body", body)])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("[WA ERROR] to={} status={} body={}", to, status, body);
            return Err(NotificationError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let message = response.json::<MessageResource>().await?;
        info!("WhatsApp message {} sent to {}", message.sid, to);

        Ok(DeliveryReceipt::Sent { sid: message.sid, to })
    }
}

#[async_trait]
impl Notifier for TwilioWhatsAppNotifier {
    async fn notify(
        &self,
        patient: &PatientId,
        kind: NotificationKind,
        payload: &NotificationPayload,
    ) -> Result<DeliveryReceipt, NotificationError> {
        let body = render(kind, payload);
        self.send_text(patient.as_str(), &body).await
    }
}
