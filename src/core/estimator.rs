//! Impact estimation for custom actions.
//!
//! Catalog actions carry their own reward and CO2 value. Custom actions are priced by an
//! [`ImpactEstimator`] handed to the reward service. [`RuleBasedEstimator`] is the
//! deterministic keyword heuristic, used directly or as the fallback when another
//! estimator is unavailable.

use crate::errors::Result;

/// Highest reward an estimate may grant.
pub const MAX_ESTIMATED_REWARD: i64 = 20;

/// Estimated environmental impact of an action.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpactEstimate {
    /// Kg of CO2 produced by the action; negative values are savings
    pub co2_impact: f64,
    /// Buds to grant, within `0..=MAX_ESTIMATED_REWARD`
    pub reward_amount: i64,
    /// Human readable explanation
    pub narrative: String,
}

impl ImpactEstimate {
    /// Kg of CO2 saved, never negative.
    #[must_use]
    pub fn co2_saved(&self) -> f64 {
        if self.co2_impact.is_finite() && self.co2_impact < 0.0 {
            -self.co2_impact
        } else {
            0.0
        }
    }

    /// Brings the reward back into range and drops a non-finite CO2 value.
    #[must_use]
    pub fn clamped(self) -> Self {
        Self {
            co2_impact: if self.co2_impact.is_finite() {
                self.co2_impact
            } else {
                0.0
            },
            reward_amount: self.reward_amount.clamp(0, MAX_ESTIMATED_REWARD),
            narrative: self.narrative,
        }
    }
}

/// Prices an action from its description.
pub trait ImpactEstimator: Send + Sync {
    /// Estimates the impact of an action.
    ///
    /// # Errors
    /// Returns [`crate::errors::Error::EstimatorUnavailable`] when no estimate can be made.
    fn estimate(&self, title: &str, category: &str, notes: Option<&str>)
    -> Result<ImpactEstimate>;
}

struct KeywordRule {
    keywords: &'static [&'static str],
    co2_impact: f64,
    reward: i64,
    narrative: &'static str,
}

const fn rule(
    keywords: &'static [&'static str],
    co2_impact: f64,
    reward: i64,
    narrative: &'static str,
) -> KeywordRule {
    KeywordRule {
        keywords,
        co2_impact,
        reward,
        narrative,
    }
}

const TRANSPORTATION: &[KeywordRule] = &[
    rule(
        &["public transit", "bus", "train"],
        -2.3,
        15,
        "2.3 kg CO₂ saved by using public transit instead of driving",
    ),
    rule(
        &["walk"],
        -1.8,
        12,
        "1.8 kg CO₂ saved by walking instead of driving",
    ),
    rule(
        &["carpool", "rideshare"],
        -1.5,
        10,
        "1.5 kg CO₂ saved by sharing a ride instead of driving alone",
    ),
    rule(
        &["bike", "cycling"],
        -2.1,
        14,
        "2.1 kg CO₂ saved by cycling instead of driving",
    ),
    rule(
        &[],
        -1.0,
        8,
        "1.0 kg CO₂ saved through eco-friendly transportation",
    ),
];

const WASTE: &[KeywordRule] = &[
    rule(
        &["reusable", "mug", "cup"],
        -0.5,
        8,
        "0.5 kg CO₂ saved by using reusable items instead of disposables",
    ),
    rule(
        &["bag", "shopping"],
        -0.3,
        5,
        "0.3 kg CO₂ saved by avoiding plastic bag production and disposal",
    ),
    rule(
        &["recycl"],
        -0.8,
        10,
        "0.8 kg CO₂ saved by recycling materials instead of landfill disposal",
    ),
    rule(
        &["compost"],
        -0.6,
        7,
        "0.6 kg CO₂ saved by composting instead of landfill disposal",
    ),
    rule(
        &[],
        -0.4,
        6,
        "0.4 kg CO₂ saved through waste reduction practices",
    ),
];

const FOOD: &[KeywordRule] = &[
    rule(
        &["meatless", "vegetarian", "vegan"],
        -1.5,
        10,
        "1.5 kg CO₂ saved by choosing plant-based food over animal products",
    ),
    rule(
        &["local", "produce"],
        -0.4,
        7,
        "0.4 kg CO₂ saved by reducing food transportation emissions",
    ),
    rule(
        &[],
        -0.3,
        5,
        "0.3 kg CO₂ saved through sustainable food choices",
    ),
];

// Lighting is matched separately, see `RuleBasedEstimator::lighting`
const ENERGY: &[KeywordRule] = &[
    rule(
        &["unplug", "standby"],
        -0.2,
        5,
        "0.2 kg CO₂ saved by eliminating standby power consumption",
    ),
    rule(
        &["shower", "bath"],
        -0.5,
        8,
        "0.5 kg CO₂ saved by reducing hot water energy consumption",
    ),
    rule(
        &[],
        -0.3,
        6,
        "0.3 kg CO₂ saved through energy conservation practices",
    ),
];

const WATER: &[KeywordRule] = &[
    rule(
        &["rain"],
        -0.1,
        8,
        "0.1 kg CO₂ saved by collecting 50L of rainwater (reduced water treatment)",
    ),
    rule(
        &["leak", "faucet"],
        -0.15,
        10,
        "0.15 kg CO₂ saved by preventing 70L of water waste daily",
    ),
    rule(
        &[],
        -0.1,
        7,
        "0.1 kg CO₂ saved through water conservation (30L saved)",
    ),
];

/// Deterministic keyword heuristic.
///
/// The category selects a rule table and the first rule whose keyword appears in the
/// lowercased title wins; each table ends with a catch-all. Unknown categories have no
/// impact and earn nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedEstimator;

impl RuleBasedEstimator {
    /// Estimates without going through the trait; never fails.
    #[must_use]
    pub fn estimate_impact(title: &str, category: &str, notes: Option<&str>) -> ImpactEstimate {
        let title = title.to_lowercase();
        let notes = notes.map(str::to_lowercase).unwrap_or_default();

        let table = match category.trim().to_lowercase().as_str() {
            "transportation" => TRANSPORTATION,
            "waste" => WASTE,
            "food" => FOOD,
            "energy" => {
                if let Some(estimate) = Self::lighting(&title, &notes) {
                    return estimate;
                }
                ENERGY
            }
            "water" => WATER,
            _ => {
                return ImpactEstimate {
                    co2_impact: 0.0,
                    reward_amount: 0,
                    narrative: "No significant environmental impact".to_string(),
                };
            }
        };

        table
            .iter()
            .find(|r| r.keywords.is_empty() || r.keywords.iter().any(|k| title.contains(k)))
            .map_or_else(
                || ImpactEstimate {
                    co2_impact: 0.0,
                    reward_amount: 0,
                    narrative: "No significant environmental impact".to_string(),
                },
                |r| ImpactEstimate {
                    co2_impact: r.co2_impact,
                    reward_amount: r.reward,
                    narrative: r.narrative.to_string(),
                },
            )
    }

    fn lighting(title: &str, notes: &str) -> Option<ImpactEstimate> {
        if !title.contains("light") {
            return None;
        }

        if !(title.contains("turn off") || title.contains("turned off")) {
            return Some(ImpactEstimate {
                co2_impact: -0.2,
                reward_amount: 5,
                narrative: "0.2 kg CO₂ saved by optimizing lighting energy usage".to_string(),
            });
        }

        let narrative = if title.contains("day") || notes.contains("day") {
            "0.3 kg CO₂ saved by turning off lights for an entire day"
        } else if title.contains("hour") || notes.contains("hour") {
            "0.02 kg CO₂ saved per hour by turning off unnecessary lights"
        } else {
            "0.3 kg CO₂ saved by reducing electricity usage for lighting"
        };
        Some(ImpactEstimate {
            co2_impact: -0.3,
            reward_amount: 5,
            narrative: narrative.to_string(),
        })
    }
}

impl ImpactEstimator for RuleBasedEstimator {
    fn estimate(
        &self,
        title: &str,
        category: &str,
        notes: Option<&str>,
    ) -> Result<ImpactEstimate> {
        Ok(Self::estimate_impact(title, category, notes))
    }
}
