use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::MessagingConfig;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// One campaign message addressed to a normalized phone number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub campaign_name: String,
    pub destination: String,
    pub template_params: Vec<String>,
}

/// Body accepted by the WhatsApp campaign API.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WhatsAppPayload {
    pub api_key: String,
    pub campaign_name: String,
    pub destination: String,
    pub user_name: String,
    pub template_params: Vec<String>,
    pub source: String,
    pub media: Map<String, Value>,
    pub buttons: Vec<Value>,
    pub carousel_cards: Vec<Value>,
    pub location: Map<String, Value>,
    pub attributes: Map<String, Value>,
    pub params_fallback_value: FallbackValues,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FallbackValues {
    #[serde(rename = "FirstName")]
    pub first_name: String,
}

impl Default for FallbackValues {
    fn default() -> Self {
        Self {
            first_name: "user".to_string(),
        }
    }
}

impl WhatsAppPayload {
    pub fn new(message: OutboundMessage, api_key: &str, user_name: &str, source: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            campaign_name: message.campaign_name,
            destination: message.destination,
            user_name: user_name.to_string(),
            template_params: message.template_params,
            source: source.to_string(),
            media: Map::new(),
            buttons: Vec::new(),
            carousel_cards: Vec::new(),
            location: Map::new(),
            attributes: Map::new(),
            params_fallback_value: FallbackValues::default(),
        }
    }
}

/// What the provider said about an accepted message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct GatewayReceipt {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub submitted_message_id: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("messaging api key is not configured")]
    MissingApiKey,
    #[error("messaging request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("messaging provider rejected the message ({status}): {body}")]
    Rejected { status: u16, body: String },
}

#[async_trait]
pub trait MessagingGateway: Send + Sync + 'static {
    async fn send(&self, message: OutboundMessage) -> Result<GatewayReceipt, GatewayError>;
}

/// HTTP client for the WhatsApp campaign API.
#[derive(Clone)]
pub struct WhatsAppClient {
    http: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    sender_name: String,
    source: String,
}

impl std::fmt::Debug for WhatsAppClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WhatsAppClient")
            .field("api_url", &self.api_url)
            .field("sender_name", &self.sender_name)
            .finish_non_exhaustive()
    }
}

impl WhatsAppClient {
    pub fn new(config: &MessagingConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            api_url: config.api_url.clone(),
            api_key: config.api_key.clone(),
            sender_name: config.sender_name.clone(),
            source: config.source.clone(),
        }
    }
}

#[async_trait]
impl MessagingGateway for WhatsAppClient {
    async fn send(&self, message: OutboundMessage) -> Result<GatewayReceipt, GatewayError> {
        let api_key = self.api_key.as_deref().ok_or(GatewayError::MissingApiKey)?;
        let payload = WhatsAppPayload::new(message, api_key, &self.sender_name, &self.source);

        let response = self.http.post(&self.api_url).json(&payload).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let body = response.text().await?;
        Ok(serde_json::from_str(&body).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_matches_the_campaign_wire_shape() {
        let payload = WhatsAppPayload::new(
            OutboundMessage {
                campaign_name: "Top_Perfomer_API".to_string(),
                destination: "919876543210".to_string(),
                template_params: vec!["Asha".to_string(), "66.00 / 100.00".to_string()],
            },
            "secret",
            "District Administration",
            "new-landing-page form",
        );

        let value = serde_json::to_value(&payload).expect("payload serializes");
        assert_eq!(
            value,
            json!({
                "apiKey": "secret",
                "campaignName": "Top_Perfomer_API",
                "destination": "919876543210",
                "userName": "District Administration",
                "templateParams": ["Asha", "66.00 / 100.00"],
                "source": "new-landing-page form",
                "media": {},
                "buttons": [],
                "carouselCards": [],
                "location": {},
                "attributes": {},
                "paramsFallbackValue": {"FirstName": "user"}
            })
        );
    }

    #[test]
    fn receipts_tolerate_missing_fields() {
        let receipt: GatewayReceipt =
            serde_json::from_str(r#"{"success": true}"#).expect("receipt parses");
        assert_eq!(receipt.success, Some(true));
        assert_eq!(receipt.submitted_message_id, None);
    }

    #[tokio::test]
    async fn refuses_to_send_without_an_api_key() {
        let client = WhatsAppClient::new(&MessagingConfig::default());
        let result = client
            .send(OutboundMessage {
                campaign_name: "Top_Perfomer_API".to_string(),
                destination: "919876543210".to_string(),
                template_params: Vec::new(),
            })
            .await;

        match result {
            Err(GatewayError::MissingApiKey) => {}
            other => panic!("expected missing api key, got {other:?}"),
        }
    }
}
