//! The pluggable model scorer.
//!
//! Feature extraction plus a linear model with sigmoid activation. The
//! predictor ships disabled; when enabled its output joins aggregation as
//! one more result under the `ml` family weight. There is no training here
//! — weights are fixed heuristics standing in for a served model.

use chrono::Utc;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sentra_core::{Decision, EvaluationContext, RuleKind, RuleResult};
use std::collections::HashMap;
use std::sync::RwLock;
use uuid::Uuid;

/// Name the model scorer reports under in `rules_fired`.
pub const ML_RESULT_NAME: &str = "ml_model";

const FEATURE_COUNT: usize = 24;

/// Flattened feature vector extracted from an evaluation context.
#[derive(Debug, Clone, Default)]
pub struct Features {
    pub amount: f64,
    pub amount_log: f64,
    pub is_high_value: f64,

    pub hour_of_day: u32,
    pub day_of_week: u32,
    pub is_weekend: f64,
    pub is_night_time: f64,

    pub tx_count_last_hour: i64,
    pub tx_count_last_day: i64,
    pub tx_amount_last_hour: f64,
    pub tx_amount_last_day: f64,

    pub is_known_location: f64,
    pub is_cross_border: f64,
    pub is_blocked_country: f64,
    pub distance_from_last: f64,

    pub is_known_device: f64,
    pub is_trusted_device: f64,
    pub device_count: i64,

    pub account_age_days: f64,
    pub days_since_last_activity: f64,
    pub avg_transaction_amount: f64,
    pub amount_deviation: f64,

    pub is_high_risk_merchant: f64,
    pub is_known_merchant: f64,
}

impl Features {
    pub fn to_vector(&self) -> [f64; FEATURE_COUNT] {
        [
            self.amount,
            self.amount_log,
            self.is_high_value,
            self.hour_of_day as f64,
            self.day_of_week as f64,
            self.is_weekend,
            self.is_night_time,
            self.tx_count_last_hour as f64,
            self.tx_count_last_day as f64,
            self.tx_amount_last_hour,
            self.tx_amount_last_day,
            self.is_known_location,
            self.is_cross_border,
            self.is_blocked_country,
            self.distance_from_last,
            self.is_known_device,
            self.is_trusted_device,
            self.device_count as f64,
            self.account_age_days,
            self.days_since_last_activity,
            self.avg_transaction_amount,
            self.amount_deviation,
            self.is_high_risk_merchant,
            self.is_known_merchant,
        ]
    }
}

/// Extracts the model's feature vector from an enrichment context.
pub struct FeatureExtractor {
    high_value_threshold: Decimal,
    blocked_countries: Vec<String>,
}

impl FeatureExtractor {
    pub fn new(high_value_threshold: Decimal, blocked_countries: Vec<String>) -> Self {
        Self {
            high_value_threshold,
            blocked_countries,
        }
    }

    pub fn extract(&self, ctx: &EvaluationContext) -> Features {
        let mut f = Features {
            amount: ctx.amount.to_f64().unwrap_or(0.0),
            ..Features::default()
        };
        f.amount_log = if f.amount > 0.0 {
            (f.amount + 1.0).log10()
        } else {
            0.0
        };
        if ctx.amount > self.high_value_threshold {
            f.is_high_value = 1.0;
        }

        use chrono::{Datelike, Timelike};
        f.hour_of_day = ctx.timestamp.hour();
        f.day_of_week = ctx.timestamp.weekday().num_days_from_sunday();
        if f.day_of_week == 0 || f.day_of_week == 6 {
            f.is_weekend = 1.0;
        }
        if f.hour_of_day >= 22 || f.hour_of_day <= 5 {
            f.is_night_time = 1.0;
        }

        let hour_ago = ctx.timestamp - chrono::Duration::hours(1);
        let day_ago = ctx.timestamp - chrono::Duration::hours(24);
        let mut amount_hour = Decimal::ZERO;
        let mut amount_day = Decimal::ZERO;
        for tx in &ctx.recent_transactions {
            if tx.timestamp > hour_ago {
                f.tx_count_last_hour += 1;
                amount_hour += tx.amount;
            }
            if tx.timestamp > day_ago {
                f.tx_count_last_day += 1;
                amount_day += tx.amount;
            }
        }
        f.tx_amount_last_hour = amount_hour.to_f64().unwrap_or(0.0);
        f.tx_amount_last_day = amount_day.to_f64().unwrap_or(0.0);

        if let Some(location) = &ctx.location {
            if self.blocked_countries.iter().any(|c| c == &location.country) {
                f.is_blocked_country = 1.0;
            }
            if let Some(payment) = &ctx.payment {
                if location.country != payment.issuing_country {
                    f.is_cross_border = 1.0;
                }
            }
            if let Some(prior) = ctx
                .recent_transactions
                .first()
                .and_then(|tx| tx.location.as_ref())
            {
                f.distance_from_last = crate::rules::haversine_km(
                    location.latitude,
                    location.longitude,
                    prior.latitude,
                    prior.longitude,
                );
            }
        }

        if let Some(device) = &ctx.device {
            if device.is_trusted_device {
                f.is_trusted_device = 1.0;
                f.is_known_device = 1.0;
            }
            if ctx.device_history.iter().any(|d| d == &device.device_id) {
                f.is_known_device = 1.0;
            }
            f.device_count = ctx.device_history.len() as i64;
        }

        if let Some(profile) = &ctx.user_profile {
            f.account_age_days = profile.account_age.num_hours() as f64 / 24.0;
            f.days_since_last_activity =
                (Utc::now() - profile.last_activity_at).num_hours() as f64 / 24.0;
            f.avg_transaction_amount = profile.average_transaction.to_f64().unwrap_or(0.0);
            if f.avg_transaction_amount > 0.0 {
                f.amount_deviation =
                    (f.amount - f.avg_transaction_amount) / f.avg_transaction_amount;
            }
            if let Some(merchant) = &ctx.merchant {
                if profile
                    .typical_merchants
                    .iter()
                    .any(|m| m == &merchant.merchant_id)
                {
                    f.is_known_merchant = 1.0;
                }
            }
            if let Some(location) = &ctx.location {
                if profile
                    .typical_countries
                    .iter()
                    .any(|c| c == &location.country)
                {
                    f.is_known_location = 1.0;
                }
            }
        }

        if let Some(merchant) = &ctx.merchant {
            if merchant.is_high_risk {
                f.is_high_risk_merchant = 1.0;
            }
        }

        f
    }
}

/// Output of a model prediction.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub score: Decimal,
    pub confidence: Decimal,
    pub model_version: String,
    pub enabled: bool,
    pub top_features: HashMap<String, f64>,
}

impl Prediction {
    /// Fold the prediction into the rule result stream under the `ml`
    /// family. Disabled or zero-score predictions contribute nothing.
    pub fn to_rule_result(&self) -> RuleResult {
        let fired = self.enabled && self.score > Decimal::ZERO;
        RuleResult {
            rule_id: Uuid::nil(),
            rule_name: ML_RESULT_NAME.to_string(),
            kind: RuleKind::Ml,
            fired,
            score: if fired { self.score } else { Decimal::ZERO },
            reason: format!("Model {} fraud probability {}", self.model_version, self.score),
            action: Decision::Allow,
            evaluated_at: Utc::now(),
            metadata: HashMap::new(),
        }
    }
}

/// Linear model over the extracted features.
pub struct MlPredictor {
    extractor: FeatureExtractor,
    model_version: String,
    enabled: RwLock<bool>,
    weights: [f64; FEATURE_COUNT],
}

impl MlPredictor {
    pub fn new(extractor: FeatureExtractor, model_version: impl Into<String>, enabled: bool) -> Self {
        Self {
            extractor,
            model_version: model_version.into(),
            enabled: RwLock::new(enabled),
            weights: default_model_weights(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        *self.enabled.read().expect("predictor flag poisoned")
    }

    pub fn set_enabled(&self, enabled: bool) {
        *self.enabled.write().expect("predictor flag poisoned") = enabled;
    }

    pub fn model_version(&self) -> &str {
        &self.model_version
    }

    /// Score the context. A disabled predictor returns a zero prediction
    /// without touching the feature extractor.
    pub fn predict(&self, ctx: &EvaluationContext) -> Prediction {
        if !self.is_enabled() {
            return Prediction {
                score: Decimal::ZERO,
                confidence: Decimal::ZERO,
                model_version: self.model_version.clone(),
                enabled: false,
                top_features: HashMap::new(),
            };
        }

        let features = self.extractor.extract(ctx);
        let vector = features.to_vector();

        let sum: f64 = vector
            .iter()
            .zip(self.weights.iter())
            .map(|(v, w)| v * w)
            .sum();
        let score = sigmoid(sum);

        Prediction {
            score: Decimal::from_f64(score).unwrap_or(Decimal::ZERO).round_dp(6),
            confidence: Decimal::from_f64(self.confidence(&features))
                .unwrap_or(Decimal::ZERO)
                .round_dp(4),
            model_version: self.model_version.clone(),
            enabled: true,
            top_features: self.top_contributors(&vector),
        }
    }

    /// Confidence grows with data completeness, capped at 0.95.
    fn confidence(&self, features: &Features) -> f64 {
        let mut confidence: f64 = 0.5;
        if features.device_count > 0 {
            confidence += 0.1;
        }
        if features.account_age_days > 30.0 {
            confidence += 0.1;
        }
        if features.tx_count_last_day > 0 {
            confidence += 0.1;
        }
        if features.avg_transaction_amount > 0.0 {
            confidence += 0.1;
        }
        if features.is_known_location == 1.0 || features.is_known_device == 1.0 {
            confidence += 0.1;
        }
        confidence.min(0.95)
    }

    fn top_contributors(&self, vector: &[f64; FEATURE_COUNT]) -> HashMap<String, f64> {
        let mut contributions = HashMap::new();
        for ((value, weight), name) in vector.iter().zip(self.weights.iter()).zip(FEATURE_NAMES) {
            let contribution = value * weight;
            if contribution.abs() > 0.05 {
                contributions.insert(name.to_string(), contribution);
            }
        }
        contributions
    }
}

fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "amount",
    "amount_log",
    "is_high_value",
    "hour_of_day",
    "day_of_week",
    "is_weekend",
    "is_night_time",
    "tx_count_hour",
    "tx_count_day",
    "tx_amount_hour",
    "tx_amount_day",
    "is_known_location",
    "is_cross_border",
    "is_blocked_country",
    "distance_from_last",
    "is_known_device",
    "is_trusted_device",
    "device_count",
    "account_age_days",
    "days_since_last_activity",
    "avg_tx_amount",
    "amount_deviation",
    "is_high_risk_merchant",
    "is_known_merchant",
];

/// Heuristic weights emphasising known fraud indicators; negative weights
/// reduce risk.
fn default_model_weights() -> [f64; FEATURE_COUNT] {
    [
        0.001,  // amount
        0.05,   // amount_log
        0.3,    // is_high_value
        0.01,   // hour_of_day
        0.0,    // day_of_week
        0.05,   // is_weekend
        0.15,   // is_night_time
        0.2,    // tx_count_hour
        0.1,    // tx_count_day
        0.001,  // tx_amount_hour
        0.0005, // tx_amount_day
        -0.3,   // is_known_location
        0.25,   // is_cross_border
        0.8,    // is_blocked_country
        0.001,  // distance_from_last
        -0.25,  // is_known_device
        -0.35,  // is_trusted_device
        0.05,   // device_count
        -0.01,  // account_age_days
        0.02,   // days_since_last_activity
        -0.001, // avg_tx_amount
        0.15,   // amount_deviation
        0.4,    // is_high_risk_merchant
        -0.2,   // is_known_merchant
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;
    use sentra_core::{GeoLocation, PaymentMethod, UserProfile};

    fn extractor() -> FeatureExtractor {
        FeatureExtractor::new(dec!(1000), vec!["KP".into()])
    }

    fn ctx() -> EvaluationContext {
        EvaluationContext::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            dec!(100.00),
            "USD",
            Utc.with_ymd_and_hms(2026, 3, 16, 14, 0, 0).unwrap(),
        )
    }

    #[test]
    fn disabled_predictor_returns_zero() {
        let predictor = MlPredictor::new(extractor(), "v1.0.0", false);
        let prediction = predictor.predict(&ctx());
        assert!(!prediction.enabled);
        assert_eq!(prediction.score, Decimal::ZERO);
        assert!(!prediction.to_rule_result().fired);
    }

    #[test]
    fn enabled_flag_can_be_flipped_at_runtime() {
        let predictor = MlPredictor::new(extractor(), "v1.0.0", false);
        assert!(!predictor.is_enabled());
        predictor.set_enabled(true);
        assert!(predictor.is_enabled());
        assert!(predictor.predict(&ctx()).enabled);
    }

    #[test]
    fn prediction_score_stays_in_unit_interval() {
        let predictor = MlPredictor::new(extractor(), "v1.0.0", true);
        let mut ctx = ctx();
        ctx.amount = dec!(50000.00);
        let prediction = predictor.predict(&ctx);
        assert!(prediction.score > Decimal::ZERO);
        assert!(prediction.score <= Decimal::ONE);
    }

    #[test]
    fn blocked_country_raises_the_score() {
        let predictor = MlPredictor::new(extractor(), "v1.0.0", true);

        let mut safe = ctx();
        safe.location = Some(GeoLocation {
            latitude: 40.0,
            longitude: -74.0,
            country: "US".into(),
            city: "New York".into(),
            region: None,
            ip_address: None,
        });
        let mut risky = safe.clone();
        risky.location.as_mut().unwrap().country = "KP".into();

        let safe_score = predictor.predict(&safe).score;
        let risky_score = predictor.predict(&risky).score;
        assert!(risky_score > safe_score);
    }

    #[test]
    fn high_value_and_night_time_features_extract() {
        let e = extractor();
        let mut ctx = ctx();
        ctx.amount = dec!(2500.00);
        ctx.timestamp = Utc.with_ymd_and_hms(2026, 3, 16, 3, 0, 0).unwrap();

        let f = e.extract(&ctx);
        assert_eq!(f.is_high_value, 1.0);
        assert_eq!(f.is_night_time, 1.0);
        assert!((f.amount_log - (2501.0f64).log10()).abs() < 1e-9);
    }

    #[test]
    fn cross_border_compares_location_to_issuing_country() {
        let e = extractor();
        let mut ctx = ctx();
        ctx.location = Some(GeoLocation {
            latitude: 48.85,
            longitude: 2.35,
            country: "FR".into(),
            city: "Paris".into(),
            region: None,
            ip_address: None,
        });
        ctx.payment = Some(PaymentMethod {
            kind: "card".into(),
            last4: "4242".into(),
            network: "visa".into(),
            bank_id: None,
            issuing_country: "US".into(),
        });

        assert_eq!(e.extract(&ctx).is_cross_border, 1.0);
    }

    #[test]
    fn confidence_reflects_data_completeness() {
        let predictor = MlPredictor::new(extractor(), "v1.0.0", true);

        let bare = predictor.predict(&ctx());

        let mut rich = ctx();
        let mut profile = UserProfile::default_for(rich.user_id);
        profile.account_age = chrono::Duration::days(400);
        profile.average_transaction = dec!(80.00);
        profile.typical_countries = vec!["US".into()];
        rich.user_profile = Some(profile);
        rich.device_history = vec!["dev-1".into()];
        let rich_prediction = predictor.predict(&rich);

        assert!(rich_prediction.confidence > bare.confidence);
        assert!(rich_prediction.confidence <= dec!(0.95));
    }
}
