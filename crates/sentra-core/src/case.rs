//! Fraud investigation cases.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;
use crate::types::{CaseStatus, RiskLevel};

/// A note added to a case during investigation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseNote {
    pub id: Uuid,
    pub author: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Evidence attached to a case (screenshot, log extract, document, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Evidence {
    pub id: Uuid,
    pub kind: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "std::collections::HashMap::is_empty")]
    pub metadata: std::collections::HashMap<String, String>,
    pub created_at: DateTime<Utc>,
}

/// An investigated fraud incident, created when the pipeline flags a
/// high-risk transaction.
///
/// State machine: `open → investigating` (on assign) `→ resolved` (on
/// resolve) `→ closed` (on close); `open | investigating → escalated`.
/// `closed` is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FraudCase {
    pub id: Uuid,
    /// All transactions folded into this case; never empty.
    pub transaction_ids: Vec<Uuid>,
    pub user_id: Uuid,
    pub account_id: Uuid,

    pub status: CaseStatus,
    pub risk_level: RiskLevel,
    pub total_amount: Decimal,
    pub currency: String,

    pub assigned_to: Option<Uuid>,
    pub description: String,
    pub notes: Vec<CaseNote>,
    pub evidence: Vec<Evidence>,

    pub resolution: Option<String>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FraudCase {
    pub fn new(
        transaction_id: Uuid,
        user_id: Uuid,
        account_id: Uuid,
        risk_level: RiskLevel,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            transaction_ids: vec![transaction_id],
            user_id,
            account_id,
            status: CaseStatus::Open,
            risk_level,
            total_amount: Decimal::ZERO,
            currency: String::new(),
            assigned_to: None,
            description: String::new(),
            notes: Vec::new(),
            evidence: Vec::new(),
            resolution: None,
            resolved_by: None,
            resolved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Assign the case to an investigator. Fails on closed or resolved cases.
    pub fn assign(&mut self, investigator: Uuid) -> Result<(), DomainError> {
        if matches!(self.status, CaseStatus::Closed | CaseStatus::Resolved) {
            return Err(DomainError::CaseAlreadyClosed);
        }
        self.assigned_to = Some(investigator);
        self.status = CaseStatus::Investigating;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn add_note(&mut self, author: Uuid, content: impl Into<String>) {
        self.notes.push(CaseNote {
            id: Uuid::new_v4(),
            author,
            content: content.into(),
            created_at: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    pub fn add_evidence(
        &mut self,
        kind: impl Into<String>,
        description: impl Into<String>,
        url: Option<String>,
        metadata: std::collections::HashMap<String, String>,
    ) {
        self.evidence.push(Evidence {
            id: Uuid::new_v4(),
            kind: kind.into(),
            description: description.into(),
            url,
            metadata,
            created_at: Utc::now(),
        });
        self.updated_at = Utc::now();
    }

    /// Mark the case resolved. Fails if already closed.
    pub fn resolve(
        &mut self,
        resolver: Uuid,
        resolution: impl Into<String>,
    ) -> Result<(), DomainError> {
        if self.status == CaseStatus::Closed {
            return Err(DomainError::CaseAlreadyClosed);
        }
        let now = Utc::now();
        self.status = CaseStatus::Resolved;
        self.resolution = Some(resolution.into());
        self.resolved_by = Some(resolver);
        self.resolved_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Close a resolved case. Closing is terminal.
    pub fn close(&mut self) -> Result<(), DomainError> {
        if self.status != CaseStatus::Resolved {
            return Err(DomainError::CaseNotResolved);
        }
        self.status = CaseStatus::Closed;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Escalate an open or in-investigation case to a higher authority.
    pub fn escalate(&mut self, reason: impl Into<String>) -> Result<(), DomainError> {
        if !matches!(self.status, CaseStatus::Open | CaseStatus::Investigating) {
            return Err(DomainError::CaseNotEscalatable {
                status: self.status.to_string(),
            });
        }
        self.status = CaseStatus::Escalated;
        let reason = reason.into();
        self.add_note(Uuid::nil(), format!("Case escalated: {reason}"));
        Ok(())
    }

    pub fn add_transaction(&mut self, transaction_id: Uuid) {
        self.transaction_ids.push(transaction_id);
        self.updated_at = Utc::now();
    }

    pub fn is_open(&self) -> bool {
        matches!(self.status, CaseStatus::Open | CaseStatus::Investigating)
    }
}
