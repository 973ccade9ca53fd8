//! Razorpay webhook endpoint.
//!
//! ```text
//! POST /api/razorpay/webhook
//!   x-razorpay-signature: hex(HMAC-SHA256(secret, raw body))
//!
//!   no secret configured  → 500
//!   signature mismatch    → 400
//!   dispatch failure      → 500 {"error": ...}
//!   otherwise             → 200 {"received": true}
//! ```
//!
//! The signature is computed over the exact bytes received, so the body is
//! read raw and only parsed after verification.

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use thiserror::Error;

use crate::metrics;
use crate::subscription::{
    PaymentRecord, PaymentStatus, SubscriptionLedger, SubscriptionStatus, SubscriptionUpdate,
};
use crate::AppState;

/// Header carrying the signature.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

type HmacSha256 = Hmac<Sha256>;

/// Webhook failures.
#[derive(Debug, Error)]
pub enum WebhookError {
    /// The server has no webhook secret.
    #[error("webhook secret not configured")]
    MissingSecret,
    /// Signature header missing or wrong.
    #[error("invalid signature")]
    InvalidSignature,
    /// Body is not a webhook payload.
    #[error("invalid payload: {0}")]
    Payload(#[from] serde_json::Error),
    /// The event needs an entity the payload lacks.
    #[error("event {event} has no {entity} entity")]
    MissingEntity {
        /// Event name.
        event: String,
        /// Missing entity.
        entity: &'static str,
    },
}

impl WebhookError {
    /// HTTP status for this failure.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::InvalidSignature => StatusCode::BAD_REQUEST,
            Self::MissingSecret | Self::Payload(_) | Self::MissingEntity { .. } => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

/// Hex HMAC-SHA256 of `body` under `secret`.
#[must_use]
pub fn sign(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .unwrap_or_else(|_| unreachable!("HMAC takes any key length"));
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

/// Check `signature` against `body` in constant time.
#[must_use]
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> bool {
    let Ok(expected) = hex::decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Top-level webhook body.
#[derive(Debug, Deserialize)]
pub struct WebhookEnvelope {
    /// Event name, e.g. `subscription.charged`.
    pub event: String,
    /// Entities attached to the event.
    #[serde(default)]
    pub payload: WebhookPayload,
}

/// Entities attached to an event.
#[derive(Debug, Default, Deserialize)]
pub struct WebhookPayload {
    /// Subscription entity.
    pub subscription: Option<Wrapped<SubscriptionEntity>>,
    /// Payment entity.
    pub payment: Option<Wrapped<PaymentEntity>>,
}

/// Razorpay nests every entity under `entity`.
#[derive(Debug, Deserialize)]
pub struct Wrapped<T> {
    /// The entity.
    pub entity: T,
}

/// Fields of a subscription entity we use.
#[derive(Debug, Deserialize)]
pub struct SubscriptionEntity {
    /// Subscription id.
    pub id: String,
    /// Plan id.
    pub plan_id: Option<String>,
    /// Free-form notes; an object, or `[]` when empty.
    #[serde(default)]
    pub notes: Value,
}

impl SubscriptionEntity {
    /// `notes.user_id`, when present.
    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        self.notes
            .get("user_id")
            .and_then(Value::as_str)
            .map(str::to_string)
    }
}

/// Fields of a payment entity we use.
#[derive(Debug, Deserialize)]
pub struct PaymentEntity {
    /// Payment id.
    pub id: String,
    /// Amount in the smallest currency unit.
    #[serde(default)]
    pub amount: u64,
    /// Currency code.
    #[serde(default)]
    pub currency: String,
}

/// What a dispatched event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatched {
    /// A subscription changed status.
    Subscription(SubscriptionStatus),
    /// A payment was logged.
    Payment(PaymentStatus),
    /// The event is not one we handle.
    Ignored,
}

/// Apply one event to the ledger.
///
/// # Errors
///
/// Returns [`WebhookError::MissingEntity`] when a known event lacks the
/// entity it acts on.
pub fn dispatch(
    ledger: &SubscriptionLedger,
    envelope: WebhookEnvelope,
) -> Result<Dispatched, WebhookError> {
    let WebhookEnvelope { event, payload } = envelope;
    let missing = |entity| WebhookError::MissingEntity {
        event: event.clone(),
        entity,
    };

    let subscription_status = match event.as_str() {
        "subscription.activated" | "subscription.charged" => Some(SubscriptionStatus::Active),
        "subscription.pending" => Some(SubscriptionStatus::Pending),
        "subscription.halted" => Some(SubscriptionStatus::Halted),
        "subscription.cancelled" => Some(SubscriptionStatus::Cancelled),
        "subscription.completed" => Some(SubscriptionStatus::Completed),
        _ => None,
    };

    if let Some(status) = subscription_status {
        let subscription = payload
            .subscription
            .ok_or_else(|| missing("subscription"))?
            .entity;
        let charged = event == "subscription.charged";
        if charged {
            if let Some(payment) = payload.payment {
                ledger.record_payment(payment_record(
                    payment.entity,
                    Some(subscription.id.clone()),
                    PaymentStatus::Captured,
                ));
            }
        }
        let record = ledger.apply(
            SubscriptionUpdate {
                user_id: subscription.user_id(),
                subscription_id: subscription.id,
                plan_id: subscription.plan_id,
                status,
            },
            charged,
        );
        tracing::info!(
            event = %event,
            subscription = %record.subscription_id,
            status = ?status,
            "Subscription event applied"
        );
        return Ok(Dispatched::Subscription(status));
    }

    let payment_status = match event.as_str() {
        "payment.captured" => PaymentStatus::Captured,
        "payment.failed" => PaymentStatus::Failed,
        _ => {
            tracing::info!(event = %event, "Unhandled webhook event");
            return Ok(Dispatched::Ignored);
        }
    };
    let payment = payload.payment.ok_or_else(|| missing("payment"))?.entity;
    let subscription_id = payload.subscription.map(|s| s.entity.id);
    tracing::info!(event = %event, payment = %payment.id, "Payment event logged");
    ledger.record_payment(payment_record(payment, subscription_id, payment_status));
    Ok(Dispatched::Payment(payment_status))
}

fn payment_record(
    payment: PaymentEntity,
    subscription_id: Option<String>,
    status: PaymentStatus,
) -> PaymentRecord {
    PaymentRecord {
        payment_id: payment.id,
        subscription_id,
        amount: payment.amount,
        currency: payment.currency,
        status,
        recorded_at: 0,
    }
}

/// Verify and dispatch a raw webhook request.
///
/// # Errors
///
/// Returns [`WebhookError::MissingSecret`] if `secret` is `None`, before the
/// signature is looked at.
pub fn handle_webhook(
    ledger: &SubscriptionLedger,
    secret: Option<&str>,
    signature: Option<&str>,
    body: &[u8],
) -> Result<Dispatched, WebhookError> {
    let secret = secret
        .filter(|s| !s.is_empty())
        .ok_or(WebhookError::MissingSecret)?;
    let verified = signature.is_some_and(|sig| verify_signature(secret, body, sig));
    if !verified {
        return Err(WebhookError::InvalidSignature);
    }
    let envelope: WebhookEnvelope = serde_json::from_slice(body)?;
    dispatch(ledger, envelope)
}

/// `POST /api/razorpay/webhook`.
#[tracing::instrument(name = "razorpay_webhook", skip_all, fields(bytes = body.len()))]
pub async fn razorpay_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok());

    match handle_webhook(
        &state.ledger,
        state.config.webhook_secret(),
        signature,
        &body,
    ) {
        Ok(dispatched) => {
            metrics::record_webhook_event(dispatched_label(dispatched));
            (StatusCode::OK, Json(json!({ "received": true })))
        }
        Err(e) => {
            match &e {
                WebhookError::InvalidSignature => {
                    metrics::record_signature_failure();
                    tracing::warn!("Rejected webhook: {e}");
                }
                WebhookError::MissingSecret => {
                    tracing::error!("Webhook received but RAZORPAY_WEBHOOK_SECRET is not set");
                }
                _ => tracing::error!("Webhook processing failed: {e}"),
            }
            (e.status(), Json(json!({ "error": e.to_string() })))
        }
    }
}

fn dispatched_label(dispatched: Dispatched) -> &'static str {
    match dispatched {
        Dispatched::Subscription(_) => "subscription",
        Dispatched::Payment(_) => "payment",
        Dispatched::Ignored => "ignored",
    }
}
