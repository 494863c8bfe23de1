//! Outbound messaging seam, template payloads, and the messaging-window
//! policy gate with its audit trail.

pub mod audit;
pub mod dispatch;
pub mod inbound;
pub mod policy;
pub mod templates;

pub use audit::{AuditRecord, AuditTrail};
pub use dispatch::{Delivery, OutboundDispatcher};
pub use inbound::InboundTimestamps;
pub use policy::{PolicyDecision, PolicyGate};
pub use templates::MessageTemplates;

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

/// Named template variables.
pub type Payload = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OutboundBody {
    Template { name: String, variables: Payload },
    Freeform { text: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    pub to: String,
    pub body: OutboundBody,
}

impl OutboundMessage {
    pub fn template(to: &str, name: &str, variables: Payload) -> Self {
        Self {
            to: to.to_string(),
            body: OutboundBody::Template {
                name: name.to_string(),
                variables,
            },
        }
    }

    pub fn freeform(to: &str, text: &str) -> Self {
        Self {
            to: to.to_string(),
            body: OutboundBody::Freeform {
                text: text.to_string(),
            },
        }
    }

    pub fn template_name(&self) -> Option<&str> {
        match &self.body {
            OutboundBody::Template { name, .. } => Some(name),
            OutboundBody::Freeform { .. } => None,
        }
    }
}

/// External delivery collaborator. Fire-and-forget: the core builds the
/// message, the gateway owns transport and retries.
pub trait MessageGateway: Send + Sync {
    fn send(&self, message: OutboundMessage);
}

/// Keeps every message in memory. Used by tests and dry runs.
#[derive(Default)]
pub struct RecordingGateway {
    sent: Mutex<Vec<OutboundMessage>>,
}

impl RecordingGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<OutboundMessage> {
        self.sent.lock().map(|buf| buf.clone()).unwrap_or_default()
    }

    /// Messages sent with the given template name.
    pub fn sent_with_template(&self, name: &str) -> Vec<OutboundMessage> {
        self.sent()
            .into_iter()
            .filter(|m| m.template_name() == Some(name))
            .collect()
    }
}

impl MessageGateway for RecordingGateway {
    fn send(&self, message: OutboundMessage) {
        if let Ok(mut buf) = self.sent.lock() {
            buf.push(message);
        }
    }
}

/// Emits one tracing event per message and drops it.
#[derive(Default)]
pub struct LoggingGateway;

impl MessageGateway for LoggingGateway {
    fn send(&self, message: OutboundMessage) {
        match &message.body {
            OutboundBody::Template { name, variables } => tracing::info!(
                recipient = %message.to,
                template = %name,
                variable_count = variables.len(),
                "Outbound template message"
            ),
            OutboundBody::Freeform { text } => tracing::info!(
                recipient = %message.to,
                body_len = text.len(),
                "Outbound freeform message"
            ),
        }
    }
}
