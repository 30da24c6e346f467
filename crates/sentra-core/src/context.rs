//! The enriched view of a transaction handed to the rule engine.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Geographic origin of a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoLocation {
    pub latitude: f64,
    pub longitude: f64,
    pub country: String,
    pub city: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
}

/// Device the transaction originated from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub device_type: String,
    pub os: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    pub is_trusted_device: bool,
}

/// Merchant receiving the payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerchantInfo {
    pub merchant_id: String,
    pub merchant_name: String,
    /// Four-digit merchant category code.
    pub merchant_category: String,
    pub country: String,
    pub is_high_risk: bool,
}

/// Payment instrument descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub kind: String,
    pub last4: String,
    pub network: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bank_id: Option<String>,
    pub issuing_country: String,
}

/// Condensed view of a prior transaction, as recovered from the window store.
#[derive(Debug, Clone)]
pub struct TransactionSummary {
    pub id: Uuid,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub location: Option<GeoLocation>,
}

/// What we know about the user at evaluation time.
#[derive(Debug, Clone)]
pub struct UserProfile {
    pub user_id: Uuid,
    pub account_age: Duration,
    pub typical_countries: Vec<String>,
    pub typical_merchants: Vec<String>,
    pub average_transaction: Decimal,
    pub last_activity_at: DateTime<Utc>,
}

impl UserProfile {
    /// Fallback profile used when no enrichment source has data for the
    /// user: a 30-day-old account last active a day ago.
    pub fn default_for(user_id: Uuid) -> Self {
        Self {
            user_id,
            account_age: Duration::days(30),
            typical_countries: Vec::new(),
            typical_merchants: Vec::new(),
            average_transaction: Decimal::ZERO,
            last_activity_at: Utc::now() - Duration::hours(24),
        }
    }
}

/// Everything the rule engine sees for a single transaction: the raw event
/// plus enrichment (recent history, profile, device history).
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    pub transaction_id: Uuid,
    pub user_id: Uuid,
    pub account_id: Uuid,
    pub amount: Decimal,
    pub currency: String,
    pub timestamp: DateTime<Utc>,

    pub location: Option<GeoLocation>,
    pub device: Option<DeviceInfo>,
    pub merchant: Option<MerchantInfo>,
    pub payment: Option<PaymentMethod>,

    /// Recent transactions, newest first.
    pub recent_transactions: Vec<TransactionSummary>,
    pub user_profile: Option<UserProfile>,
    pub device_history: Vec<String>,
}

impl EvaluationContext {
    pub fn new(
        transaction_id: Uuid,
        user_id: Uuid,
        account_id: Uuid,
        amount: Decimal,
        currency: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            transaction_id,
            user_id,
            account_id,
            amount,
            currency: currency.into(),
            timestamp,
            location: None,
            device: None,
            merchant: None,
            payment: None,
            recent_transactions: Vec::new(),
            user_profile: None,
            device_history: Vec::new(),
        }
    }
}
