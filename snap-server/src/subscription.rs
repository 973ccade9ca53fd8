//! In-memory subscription and payment ledger.
//!
//! Webhook events mutate the ledger; the export endpoint reads a user's
//! [`Tier`] from it.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use snap_renderer::Tier;

/// Lifecycle state of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    /// Paid and current.
    Active,
    /// A charge is being retried.
    Pending,
    /// Charges failed repeatedly; access suspended.
    Halted,
    /// Cancelled by the user or merchant.
    Cancelled,
    /// Ran its full term.
    Completed,
}

impl SubscriptionStatus {
    /// Whether the subscriber keeps paid features in this state.
    #[must_use]
    pub const fn grants_pro(self) -> bool {
        matches!(self, Self::Active | Self::Pending)
    }
}

/// One subscription as last reported by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    /// Provider subscription id.
    pub subscription_id: String,
    /// Our user, from the subscription notes.
    pub user_id: Option<String>,
    /// Provider plan id.
    pub plan_id: Option<String>,
    /// Current status.
    pub status: SubscriptionStatus,
    /// Successful charges seen so far.
    pub charges: u32,
    /// Unix seconds of the last update.
    pub updated_at: u64,
}

/// Whether a payment went through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    /// Money captured.
    Captured,
    /// Payment failed.
    Failed,
}

/// One entry of the payment log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Provider payment id.
    pub payment_id: String,
    /// Subscription the payment belongs to, if any.
    pub subscription_id: Option<String>,
    /// Amount in the currency's smallest unit.
    pub amount: u64,
    /// ISO currency code.
    pub currency: String,
    /// Outcome.
    pub status: PaymentStatus,
    /// Unix seconds when logged.
    pub recorded_at: u64,
}

/// A subscription change to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionUpdate {
    /// Provider subscription id.
    pub subscription_id: String,
    /// Our user, when known.
    pub user_id: Option<String>,
    /// Provider plan id, when known.
    pub plan_id: Option<String>,
    /// New status.
    pub status: SubscriptionStatus,
}

/// Payments kept in the log by default.
pub const DEFAULT_PAYMENT_LOG: usize = 1000;

#[derive(Debug)]
struct LedgerInner {
    subscriptions: HashMap<String, SubscriptionRecord>,
    payments: VecDeque<PaymentRecord>,
    payment_capacity: usize,
}

/// Shared ledger of subscriptions and payments.
#[derive(Debug, Clone)]
pub struct SubscriptionLedger {
    inner: Arc<RwLock<LedgerInner>>,
}

impl Default for SubscriptionLedger {
    fn default() -> Self {
        Self::with_payment_capacity(DEFAULT_PAYMENT_LOG)
    }
}

impl SubscriptionLedger {
    /// Create an empty ledger.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty ledger whose payment log holds at most `capacity`
    /// entries (at least one). The oldest entries are dropped first.
    #[must_use]
    pub fn with_payment_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(LedgerInner {
                subscriptions: HashMap::new(),
                payments: VecDeque::new(),
                payment_capacity: capacity.max(1),
            })),
        }
    }

    /// Apply a status change, creating the record if needed.
    ///
    /// Fields missing from `update` keep their previous values. A `charged`
    /// update increments the charge count.
    pub fn apply(&self, update: SubscriptionUpdate, charged: bool) -> SubscriptionRecord {
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let now = unix_now();
        let record = inner
            .subscriptions
            .entry(update.subscription_id.clone())
            .or_insert_with(|| SubscriptionRecord {
                subscription_id: update.subscription_id.clone(),
                user_id: None,
                plan_id: None,
                status: update.status,
                charges: 0,
                updated_at: now,
            });

        if update.user_id.is_some() {
            record.user_id = update.user_id;
        }
        if update.plan_id.is_some() {
            record.plan_id = update.plan_id;
        }
        record.status = update.status;
        record.updated_at = now;
        if charged {
            record.charges += 1;
        }
        tracing::debug!(
            subscription = %record.subscription_id,
            status = ?record.status,
            charges = record.charges,
            "Subscription updated"
        );
        record.clone()
    }

    /// Append to the payment log, dropping the oldest entry when full.
    pub fn record_payment(&self, mut payment: PaymentRecord) {
        payment.recorded_at = unix_now();
        tracing::debug!(payment = %payment.payment_id, status = ?payment.status, "Payment logged");
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        while inner.payments.len() >= inner.payment_capacity {
            inner.payments.pop_front();
        }
        inner.payments.push_back(payment);
    }

    /// Look up a subscription.
    #[must_use]
    pub fn subscription(&self, subscription_id: &str) -> Option<SubscriptionRecord> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscriptions
            .get(subscription_id)
            .cloned()
    }

    /// Copy of the payment log, oldest first.
    #[must_use]
    pub fn payments(&self) -> Vec<PaymentRecord> {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .payments
            .iter()
            .cloned()
            .collect()
    }

    /// The tier a user is entitled to. Unknown users are free.
    #[must_use]
    pub fn tier_for(&self, user_id: &str) -> Tier {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        let pro = inner
            .subscriptions
            .values()
            .any(|s| s.user_id.as_deref() == Some(user_id) && s.status.grants_pro());
        if pro {
            Tier::Pro
        } else {
            Tier::Free
        }
    }

    /// Number of known subscriptions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .subscriptions
            .len()
    }

    /// Whether no subscription is known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs())
}
