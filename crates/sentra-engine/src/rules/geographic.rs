//! Geographic rules: country lists, location consistency, impossible travel.

use rust_decimal_macros::dec;
use sentra_core::{Decision, EvaluationContext, Rule, RuleResult};
use sentra_store::WindowStore;
use serde::Deserialize;

use super::parse_config;

/// Physical travel faster than this between two transactions is treated as
/// impossible (faster than a commercial jet).
const MAX_PLAUSIBLE_SPEED_KMH: f64 = 900.0;

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct GeographicConfig {
    pub allowed_countries: Vec<String>,
    pub blocked_countries: Vec<String>,
    pub max_distance_km: f64,
    pub require_consistent: bool,
}

pub(crate) async fn evaluate(
    rule: &Rule,
    ctx: &EvaluationContext,
    store: &dyn WindowStore,
) -> RuleResult {
    let Some(location) = &ctx.location else {
        return RuleResult::not_fired(rule, "No location data");
    };

    let config: GeographicConfig = parse_config(rule);

    if config.blocked_countries.iter().any(|c| c == &location.country) {
        let reason = format!("Transaction from blocked country: {}", location.country);
        return RuleResult::fired(rule, dec!(0.90), reason, Decision::Block)
            .with_metadata("country", location.country.clone());
    }

    if !config.allowed_countries.is_empty()
        && !config.allowed_countries.iter().any(|c| c == &location.country)
    {
        let reason = format!("Transaction from non-allowed country: {}", location.country);
        return RuleResult::fired(rule, dec!(0.75), reason, rule.action)
            .with_metadata("country", location.country.clone());
    }

    if config.require_consistent {
        match store
            .is_known_location(ctx.user_id, &location.country, &location.city)
            .await
        {
            Ok(false) => {
                let reason = format!(
                    "Transaction from new location: {}, {}",
                    location.city, location.country
                );
                return RuleResult::fired(rule, dec!(0.50), reason, Decision::Challenge)
                    .with_metadata("city", location.city.clone())
                    .with_metadata("country", location.country.clone());
            }
            Ok(true) => {}
            Err(e) => {
                tracing::warn!(rule = %rule.name, user_id = %ctx.user_id, "location check unavailable: {}", e);
            }
        }
    }

    if config.max_distance_km > 0.0 {
        if let Some(prior) = ctx.recent_transactions.first() {
            if let Some(prior_location) = &prior.location {
                let distance = haversine_km(
                    location.latitude,
                    location.longitude,
                    prior_location.latitude,
                    prior_location.longitude,
                );
                if distance > config.max_distance_km {
                    let elapsed = ctx.timestamp - prior.timestamp;
                    let hours = elapsed.num_milliseconds() as f64 / 3_600_000.0;
                    let speed = if hours > 0.0 {
                        distance / hours
                    } else {
                        f64::INFINITY
                    };
                    if speed > MAX_PLAUSIBLE_SPEED_KMH {
                        let reason = format!(
                            "Impossible travel: {:.0} km in {:.0} minutes ({:.0} km/h)",
                            distance,
                            hours * 60.0,
                            speed
                        );
                        return RuleResult::fired(rule, dec!(0.85), reason, Decision::Block)
                            .with_metadata("distance_km", distance)
                            .with_metadata("speed_kmh", speed);
                    }
                }
            }
        }
    }

    RuleResult::not_fired(rule, "Location check passed")
}

/// Great-circle distance between two coordinates, in kilometres.
pub(crate) fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}
