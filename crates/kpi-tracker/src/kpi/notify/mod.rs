//! Outbound WhatsApp delivery of ranking messages.

pub mod dispatcher;
pub mod gateway;

pub use dispatcher::{DispatchDetail, DispatchOutcome, DispatchSummary, NotificationDispatcher};
pub use gateway::{
    GatewayError, GatewayReceipt, MessagingGateway, OutboundMessage, WhatsAppClient,
    WhatsAppPayload,
};
