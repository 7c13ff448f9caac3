//! Threshold rules that turn an anomalous value into a remediation hint.
//!
//! Two rule sets exist because the two analysis contexts measure different
//! things: a batch of raw byte counts, and a live bytes-per-second rate.
//! Both go through the same evaluator; only the ordered rule table differs.
//! Bands overlap, so table order is significant and the first match wins.

use serde::{Deserialize, Serialize};

const KIB: f64 = 1024.0;
const MIB: f64 = 1024.0 * 1024.0;

/// Which threshold table to apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleSet {
    /// Simulated or user-entered byte counts per tick.
    RawCounts,
    /// Live sampled bytes per second.
    RateBps,
}

impl std::fmt::Display for RuleSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleSet::RawCounts => write!(f, "raw_counts"),
            RuleSet::RateBps => write!(f, "rate_bps"),
        }
    }
}

/// Diagnostic category of an anomalous value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    ExtremeSpike,
    DrasticDrop,
    SustainedHigh,
    UnusualPattern,
    VeryHighRate,
    ElevatedRate,
    VeryLowRate,
    NormalActivity,
    InvalidValue,
}

impl Category {
    /// Fixed follow-up advice for the category.
    pub fn remediation(&self) -> &'static str {
        match self {
            Category::ExtremeSpike => {
                "Check source/destination addresses in flow records or firewall logs, \
                 apply ACLs or rate limits, and verify server activity."
            }
            Category::DrasticDrop => {
                "Check the physical interface state, test connectivity with ping, \
                 and review device logs."
            }
            Category::SustainedHigh => {
                "Identify the applications or services responsible, review QoS policy, \
                 and evaluate whether more bandwidth is needed."
            }
            Category::UnusualPattern => {
                "Review detailed logs and metrics (NetFlow, SNMP) for the period."
            }
            Category::VeryHighRate => {
                "Look for large downloads, streaming, or backups in progress and \
                 confirm they are expected."
            }
            Category::ElevatedRate => {
                "Notable activity; confirm which processes are using the network."
            }
            Category::VeryLowRate => {
                "The link looks idle. If traffic was expected, check connectivity \
                 and the interface state."
            }
            Category::NormalActivity => "No action needed; typical local activity.",
            Category::InvalidValue => "The sample could not be interpreted as a finite number.",
        }
    }
}

/// A categorized, human-readable remediation hint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub category: Category,
    pub message: String,
}

#[derive(Debug, Clone, Copy)]
enum Band {
    Above(f64),
    Below(f64),
    /// `min <= value < max`
    Within(f64, f64),
    Any,
}

impl Band {
    fn matches(&self, value: f64) -> bool {
        match *self {
            Band::Above(t) => value > t,
            Band::Below(t) => value < t,
            Band::Within(min, max) => value >= min && value < max,
            Band::Any => true,
        }
    }
}

struct Rule {
    band: Band,
    category: Category,
}

const RAW_COUNT_RULES: &[Rule] = &[
    Rule {
        band: Band::Above(500_000.0),
        category: Category::ExtremeSpike,
    },
    Rule {
        band: Band::Below(1_000.0),
        category: Category::DrasticDrop,
    },
    Rule {
        band: Band::Above(100_000.0),
        category: Category::SustainedHigh,
    },
    Rule {
        band: Band::Any,
        category: Category::UnusualPattern,
    },
];

const RATE_RULES: &[Rule] = &[
    Rule {
        band: Band::Above(10.0 * MIB),
        category: Category::VeryHighRate,
    },
    Rule {
        band: Band::Above(MIB),
        category: Category::ElevatedRate,
    },
    Rule {
        band: Band::Within(0.0, KIB),
        category: Category::VeryLowRate,
    },
    Rule {
        band: Band::Any,
        category: Category::NormalActivity,
    },
];

impl RuleSet {
    fn rules(&self) -> &'static [Rule] {
        match self {
            RuleSet::RawCounts => RAW_COUNT_RULES,
            RuleSet::RateBps => RATE_RULES,
        }
    }
}

fn headline(category: Category, value: f64) -> String {
    match category {
        Category::ExtremeSpike => format!(
            "Extreme traffic spike: {:.1} KB/s (above 500 KB/s). Possible flood or mass transfer.",
            value / 1000.0
        ),
        Category::DrasticDrop => format!(
            "Drastic traffic drop: {:.0} B/s (below 1 KB/s). Possible link or device failure.",
            value
        ),
        Category::SustainedHigh => format!(
            "Sustained high traffic: {:.1} KB/s (above 100 KB/s). Possible congestion or new load.",
            value / 1000.0
        ),
        Category::UnusualPattern => format!(
            "Unusual traffic pattern: {:.1} KB/s.",
            value / 1000.0
        ),
        Category::VeryHighRate => format!(
            "Very high rate: {:.2} MB/s (above 10 MB/s). Heavy transfer, streaming, or backup.",
            value / MIB
        ),
        Category::ElevatedRate => format!(
            "Elevated rate: {:.2} MB/s (above 1 MB/s).",
            value / MIB
        ),
        Category::VeryLowRate => format!(
            "Very low rate: {:.0} B/s (below 1 KB/s). Idle link or possible connectivity issue.",
            value
        ),
        Category::NormalActivity => format!("Normal local activity: {:.1} KB/s.", value / KIB),
        Category::InvalidValue => format!("Invalid value: {}.", value),
    }
}

/// Map `value` to a suggestion using the first matching band of `rule_set`.
///
/// Total over `f64`: NaN and infinities yield [`Category::InvalidValue`].
pub fn classify(value: f64, rule_set: RuleSet) -> Suggestion {
    let category = if value.is_finite() {
        rule_set
            .rules()
            .iter()
            .find(|rule| rule.band.matches(value))
            .map(|rule| rule.category)
            .unwrap_or(Category::UnusualPattern)
    } else {
        Category::InvalidValue
    };

    Suggestion {
        category,
        message: format!("{} {}", headline(category, value), category.remediation()),
    }
}
