//! Per-game statistic bags and their field policies.
//!
//! A stat bag is an open map from field name to [`StatValue`]. Games may
//! report any field; how a field combines is decided by [`policy_for`], so a
//! new high-water-mark field only needs an entry in [`STAT_POLICIES`].

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Per-game statistics, keyed by field name.
pub type StatBag = BTreeMap<String, StatValue>;

/// A single statistic value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StatValue {
    /// Explicitly unset (e.g. no best time yet)
    Null,
    Int(i64),
    Float(f64),
    Flag(bool),
    Text(String),
    List(Vec<String>),
}

impl StatValue {
    /// Numeric view of the value, if it has one.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StatValue::Int(v) => Some(*v as f64),
            StatValue::Float(v) => Some(*v),
            _ => None,
        }
    }

    /// Integer view, truncating floats.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StatValue::Int(v) => Some(*v),
            StatValue::Float(v) => Some(*v as i64),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.as_f64().is_some()
    }

    fn numeric_cmp(&self, other: &StatValue) -> Option<Ordering> {
        match (self, other) {
            (StatValue::Int(a), StatValue::Int(b)) => Some(a.cmp(b)),
            _ => self.as_f64()?.partial_cmp(&other.as_f64()?),
        }
    }

    fn add(&self, other: &StatValue) -> Option<StatValue> {
        match (self, other) {
            (StatValue::Int(a), StatValue::Int(b)) => Some(StatValue::Int(a.saturating_add(*b))),
            _ => Some(StatValue::Float(self.as_f64()? + other.as_f64()?)),
        }
    }
}

impl From<i64> for StatValue {
    fn from(v: i64) -> Self {
        StatValue::Int(v)
    }
}

impl From<f64> for StatValue {
    fn from(v: f64) -> Self {
        StatValue::Float(v)
    }
}

impl From<&str> for StatValue {
    fn from(v: &str) -> Self {
        StatValue::Text(v.to_string())
    }
}

/// How a stat field combines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum StatPolicy {
    /// Running total; session deltas add, copies reconcile by max
    Accumulate,
    /// High-water mark
    Max,
    /// Low-water mark where lower is better; null means no bound yet
    Min,
    /// Last value wins
    Replace,
    /// Set of strings
    Union,
}

/// Declared policies. Fields not listed accumulate.
pub const STAT_POLICIES: &[(&str, StatPolicy)] = &[
    ("highScore", StatPolicy::Max),
    ("highWave", StatPolicy::Max),
    ("maxCombo", StatPolicy::Max),
    ("bestTime", StatPolicy::Min),
    ("difficulty", StatPolicy::Replace),
    ("lastMode", StatPolicy::Replace),
    ("wordsMastered", StatPolicy::Union),
    ("songsCompleted", StatPolicy::Union),
];

/// Policy for a field name.
pub fn policy_for(field: &str) -> StatPolicy {
    STAT_POLICIES
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, policy)| *policy)
        .unwrap_or(StatPolicy::Accumulate)
}

/// Apply one session delta to a bag.
///
/// Max/Min keep the better value, Accumulate adds numbers, Union merges
/// lists. A non-numeric delta never displaces a number under Max or Min.
pub fn apply_delta(bag: &mut StatBag, field: &str, delta: &StatValue) {
    let current = bag.get(field);
    let next = match policy_for(field) {
        StatPolicy::Max => pick_numeric(current, Some(delta), Ordering::Greater),
        StatPolicy::Min => {
            if !delta.is_numeric() && current.is_some_and(StatValue::is_numeric) {
                return;
            }
            pick_numeric(current, Some(delta), Ordering::Less)
        }
        StatPolicy::Accumulate => match current {
            Some(existing) if existing.is_numeric() && delta.is_numeric() => existing.add(delta),
            _ => Some(delta.clone()),
        },
        StatPolicy::Union => union_values(current, Some(delta)),
        StatPolicy::Replace => Some(delta.clone()),
    };

    if let Some(value) = next {
        bag.insert(field.to_string(), value);
    }
}

/// Reconcile one field from two copies of a bag.
///
/// Counters never sum here: `Accumulate` keeps the larger side, which is what
/// stops the same session from being counted twice across devices.
pub fn merge_value(
    field: &str,
    winner: Option<&StatValue>,
    loser: Option<&StatValue>,
) -> Option<StatValue> {
    match policy_for(field) {
        StatPolicy::Accumulate | StatPolicy::Max => pick_numeric(winner, loser, Ordering::Greater),
        StatPolicy::Min => pick_numeric(winner, loser, Ordering::Less),
        StatPolicy::Union => union_values(winner, loser),
        StatPolicy::Replace => winner.or(loser).cloned(),
    }
}

/// Reconcile two bags field by field; fields on either side survive.
pub fn merge_bags(winner: &StatBag, loser: &StatBag) -> StatBag {
    let mut merged = StatBag::new();
    for field in winner.keys().chain(loser.keys()) {
        if merged.contains_key(field) {
            continue;
        }
        if let Some(value) = merge_value(field, winner.get(field), loser.get(field)) {
            merged.insert(field.clone(), value);
        }
    }
    merged
}

/// Pick between two values by numeric order. A numeric side beats a
/// non-numeric or missing one; with no numbers the first present value wins.
fn pick_numeric(
    first: Option<&StatValue>,
    second: Option<&StatValue>,
    prefer: Ordering,
) -> Option<StatValue> {
    let first_num = first.filter(|v| v.is_numeric());
    let second_num = second.filter(|v| v.is_numeric());

    match (first_num, second_num) {
        (Some(a), Some(b)) => {
            if b.numeric_cmp(a) == Some(prefer) {
                Some(b.clone())
            } else {
                Some(a.clone())
            }
        }
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(b.clone()),
        (None, None) => first.or(second).cloned(),
    }
}

fn union_values(first: Option<&StatValue>, second: Option<&StatValue>) -> Option<StatValue> {
    match (first, second) {
        (Some(StatValue::List(a)), Some(StatValue::List(b))) => {
            let mut merged = a.clone();
            for item in b {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
            Some(StatValue::List(merged))
        }
        (Some(StatValue::List(a)), _) => Some(StatValue::List(a.clone())),
        (_, Some(StatValue::List(b))) => Some(StatValue::List(b.clone())),
        _ => first.or(second).cloned(),
    }
}
