//! REST API type definitions.
//!
//! Request and response types for the fraud endpoints, plus the shared
//! application state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sentra_core::{
    CaseStatus, Decision, DeviceInfo, GeoLocation, MerchantInfo, PaymentMethod, Rule, RuleKind,
    Severity,
};
use sentra_engine::{AnalyzeInput, CaseCoordinator, DecisionPipeline, RuleEngine};
use sentra_repository::DecisionRepository;
use sentra_store::WindowStore;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::ApiError;

/// Application state shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<DecisionPipeline>,
    pub engine: Arc<RuleEngine>,
    pub coordinator: Arc<CaseCoordinator>,
    pub decisions: Arc<dyn DecisionRepository>,
    pub store: Arc<dyn WindowStore>,
    /// Present in production; absent when the server runs against in-memory
    /// backends (readiness then skips the database probe).
    pub db: Option<PgPool>,
}

/// Health/readiness response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub services: Option<HashMap<String, String>>,
}

fn parse_uuid(value: &str, field: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(value).map_err(|_| ApiError::InvalidRequest(format!("invalid {field}")))
}

/// Location block of an analyze request.
#[derive(Debug, Clone, Deserialize)]
pub struct LocationRequest {
    pub latitude: f64,
    pub longitude: f64,
    pub country: String,
    pub city: String,
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

impl From<LocationRequest> for GeoLocation {
    fn from(r: LocationRequest) -> Self {
        GeoLocation {
            latitude: r.latitude,
            longitude: r.longitude,
            country: r.country,
            city: r.city,
            region: r.region,
            ip_address: r.ip_address,
        }
    }
}

/// Device block of an analyze request.
#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRequest {
    pub device_id: String,
    pub device_type: String,
    pub os: String,
    #[serde(default)]
    pub browser: Option<String>,
    #[serde(default)]
    pub user_agent: Option<String>,
    #[serde(default)]
    pub is_trusted_device: bool,
}

impl From<DeviceRequest> for DeviceInfo {
    fn from(r: DeviceRequest) -> Self {
        DeviceInfo {
            device_id: r.device_id,
            device_type: r.device_type,
            os: r.os,
            browser: r.browser,
            user_agent: r.user_agent,
            is_trusted_device: r.is_trusted_device,
        }
    }
}

/// Merchant block of an analyze request.
#[derive(Debug, Clone, Deserialize)]
pub struct MerchantRequest {
    pub merchant_id: String,
    pub merchant_name: String,
    /// Four-digit MCC.
    pub merchant_category: String,
    pub country: String,
    #[serde(default)]
    pub is_high_risk: bool,
}

impl From<MerchantRequest> for MerchantInfo {
    fn from(r: MerchantRequest) -> Self {
        MerchantInfo {
            merchant_id: r.merchant_id,
            merchant_name: r.merchant_name,
            merchant_category: r.merchant_category,
            country: r.country,
            is_high_risk: r.is_high_risk,
        }
    }
}

/// Payment block of an analyze request.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    #[serde(rename = "type")]
    pub kind: String,
    pub last4: String,
    pub network: String,
    #[serde(default)]
    pub bank_id: Option<String>,
    pub issuing_country: String,
}

impl From<PaymentRequest> for PaymentMethod {
    fn from(r: PaymentRequest) -> Self {
        PaymentMethod {
            kind: r.kind,
            last4: r.last4,
            network: r.network,
            bank_id: r.bank_id,
            issuing_country: r.issuing_country,
        }
    }
}

/// Single-transaction analyze request.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub transaction_id: String,
    pub user_id: String,
    pub account_id: String,
    /// Decimal string, e.g. `"100.00"`.
    pub amount: String,
    /// Three-character currency code.
    pub currency: String,

    #[serde(default)]
    pub location: Option<LocationRequest>,
    #[serde(default)]
    pub device: Option<DeviceRequest>,
    #[serde(default)]
    pub merchant: Option<MerchantRequest>,
    #[serde(default)]
    pub payment: Option<PaymentRequest>,
}

impl AnalyzeRequest {
    /// Validate the request and build pipeline input. Malformed fields are
    /// rejected here, before any enrichment work starts.
    pub fn into_input(self) -> Result<AnalyzeInput, ApiError> {
        let transaction_id = parse_uuid(&self.transaction_id, "transaction_id")?;
        let user_id = parse_uuid(&self.user_id, "user_id")?;
        let account_id = parse_uuid(&self.account_id, "account_id")?;

        let amount = Decimal::from_str(&self.amount)
            .map_err(|_| ApiError::InvalidRequest("invalid amount".to_string()))?;

        if self.currency.len() != 3 {
            return Err(ApiError::InvalidRequest(
                "currency must be a 3-character code".to_string(),
            ));
        }

        Ok(AnalyzeInput {
            transaction_id,
            user_id,
            account_id,
            amount,
            currency: self.currency,
            timestamp: Utc::now(),
            location: self.location.map(Into::into),
            device: self.device.map(Into::into),
            merchant: self.merchant.map(Into::into),
            payment: self.payment.map(Into::into),
        })
    }
}

/// Batch analyze request: 1 to 100 transactions.
#[derive(Debug, Deserialize)]
pub struct BatchAnalyzeRequest {
    pub transactions: Vec<AnalyzeRequest>,
}

/// Query parameters for the case listing endpoint.
#[derive(Debug, Deserialize)]
pub struct ListCasesQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    50
}

impl ListCasesQuery {
    pub fn status(&self) -> Result<CaseStatus, ApiError> {
        match &self.status {
            None => Ok(CaseStatus::Open),
            Some(raw) => CaseStatus::parse(raw)
                .ok_or_else(|| ApiError::InvalidRequest(format!("invalid case status {raw:?}"))),
        }
    }
}

/// Investigation action applied through `PUT /cases/{id}`.
#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum CaseActionRequest {
    Assign {
        assignee_id: String,
    },
    AddNote {
        author_id: String,
        content: String,
    },
    AddEvidence {
        #[serde(rename = "type")]
        kind: String,
        description: String,
        #[serde(default)]
        url: Option<String>,
        #[serde(default)]
        metadata: HashMap<String, String>,
    },
    Resolve {
        resolver_id: String,
        resolution: String,
    },
    Close,
    Escalate {
        reason: String,
    },
}

/// Rule creation request.
#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub severity: String,
    pub action: String,
    pub config: serde_json::Value,
    #[serde(default)]
    pub created_by: Option<String>,
    #[serde(default)]
    pub effective_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreateRuleRequest {
    pub fn into_rule(self) -> Result<Rule, ApiError> {
        let kind = RuleKind::parse(&self.kind)
            .filter(RuleKind::is_configurable)
            .ok_or_else(|| ApiError::InvalidRequest(format!("invalid rule type {:?}", self.kind)))?;
        let severity = Severity::parse(&self.severity).ok_or_else(|| {
            ApiError::InvalidRequest(format!("invalid rule severity {:?}", self.severity))
        })?;
        let action = Decision::parse(&self.action).ok_or_else(|| {
            ApiError::InvalidRequest(format!("invalid rule action {:?}", self.action))
        })?;
        let created_by = match &self.created_by {
            Some(raw) => parse_uuid(raw, "created_by")?,
            None => Uuid::nil(),
        };

        let mut rule = Rule::new(self.name, kind, severity, action, self.config, created_by);
        rule.description = self.description;
        if let Some(effective_at) = self.effective_at {
            rule.effective_at = effective_at;
        }
        rule.expires_at = self.expires_at;
        Ok(rule)
    }
}

pub fn parse_path_uuid(raw: &str, field: &str) -> Result<Uuid, ApiError> {
    parse_uuid(raw, field)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analyze_request() -> AnalyzeRequest {
        serde_json::from_value(json!({
            "transaction_id": Uuid::new_v4().to_string(),
            "user_id": Uuid::new_v4().to_string(),
            "account_id": Uuid::new_v4().to_string(),
            "amount": "129.95",
            "currency": "USD",
        }))
        .unwrap()
    }

    #[test]
    fn valid_request_converts() {
        let input = analyze_request().into_input().unwrap();
        assert_eq!(input.currency, "USD");
        assert_eq!(input.amount.to_string(), "129.95");
    }

    #[test]
    fn malformed_uuid_is_rejected() {
        let mut request = analyze_request();
        request.user_id = "not-a-uuid".into();
        let err = request.into_input().unwrap_err();
        assert!(err.to_string().contains("user_id"));
    }

    #[test]
    fn malformed_amount_is_rejected() {
        let mut request = analyze_request();
        request.amount = "12.3.4".into();
        assert!(request.into_input().is_err());
    }

    #[test]
    fn currency_must_be_three_characters() {
        let mut request = analyze_request();
        request.currency = "USDT".into();
        assert!(request.into_input().is_err());
    }

    #[test]
    fn case_action_deserializes_by_tag() {
        let action: CaseActionRequest = serde_json::from_value(json!({
            "action": "assign",
            "assignee_id": Uuid::new_v4().to_string(),
        }))
        .unwrap();
        assert!(matches!(action, CaseActionRequest::Assign { .. }));

        let action: CaseActionRequest =
            serde_json::from_value(json!({"action": "close"})).unwrap();
        assert!(matches!(action, CaseActionRequest::Close));
    }

    #[test]
    fn rule_request_rejects_unknown_kind() {
        let request: CreateRuleRequest = serde_json::from_value(json!({
            "name": "r",
            "type": "astrology",
            "severity": "high",
            "action": "block",
            "config": {"k": 1},
        }))
        .unwrap();
        assert!(request.into_rule().is_err());
    }

    #[test]
    fn rule_request_rejects_ml_kind() {
        let request: CreateRuleRequest = serde_json::from_value(json!({
            "name": "r",
            "type": "ml",
            "severity": "high",
            "action": "block",
            "config": {"k": 1},
        }))
        .unwrap();
        assert!(request.into_rule().is_err());
    }

    #[test]
    fn default_case_listing_status_is_open() {
        let query = ListCasesQuery {
            status: None,
            limit: 50,
            offset: 0,
        };
        assert_eq!(query.status().unwrap(), CaseStatus::Open);
    }
}
