//! Resource value algebra.
//!
//! Offers describe capacity as one of three value shapes:
//! - **Scalar**: a fractional quantity (`cpus: 1.5`, `mem: 1024`)
//! - **Ranges**: disjoint closed integer intervals (`ports: [1000-1010]`)
//! - **Set**: named items (`gpus: {a,b}`)
//!
//! Arithmetic is type-checked. Subtracting ranges or sets requires the
//! subtrahend to be contained in the minuend. Scalar subtraction may go
//! negative, which callers read as "insufficient".

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scalars are kept at thousandth precision, matching the cluster manager.
const SCALAR_PRECISION: f64 = 1000.0;

/// Errors from value arithmetic.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValueError {
    #[error("value type mismatch: {left:?} vs {right:?}")]
    TypeMismatch { left: ValueType, right: ValueType },

    #[error("cannot subtract {subtrahend} from {minuend}: not contained")]
    NotSubset { minuend: String, subtrahend: String },
}

/// Result type alias for value arithmetic.
pub type ValueResult<T> = Result<T, ValueError>;

/// The shape of a resource value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueType {
    Scalar,
    Ranges,
    Set,
}

/// A closed integer interval `[begin, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Range {
    pub begin: u64,
    pub end: u64,
}

impl Range {
    /// Build a range, swapping the bounds if given backwards.
    pub fn new(begin: u64, end: u64) -> Self {
        if begin <= end {
            Self { begin, end }
        } else {
            Self { begin: end, end: begin }
        }
    }

    /// A range holding exactly one value.
    pub fn single(value: u64) -> Self {
        Self { begin: value, end: value }
    }

    pub fn len(&self) -> u64 {
        self.end - self.begin + 1
    }

    pub fn contains(&self, value: u64) -> bool {
        self.begin <= value && value <= self.end
    }
}

impl fmt::Display for Range {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.begin, self.end)
    }
}

/// Sorted, disjoint, non-adjacent closed intervals.
///
/// Every constructor re-coalesces, so `[1-2]` plus `[3-4]` is stored as
/// `[1-4]` and structural equality is set equality.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "Vec<Range>", into = "Vec<Range>")]
pub struct Ranges(Vec<Range>);

impl Ranges {
    pub fn new(ranges: impl IntoIterator<Item = Range>) -> Self {
        Self(coalesce(ranges.into_iter().collect()))
    }

    pub fn empty() -> Self {
        Self(Vec::new())
    }

    pub fn as_slice(&self) -> &[Range] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Total number of integers covered.
    pub fn count(&self) -> u64 {
        self.0.iter().fold(0u64, |acc, r| acc.saturating_add(r.len()))
    }

    pub fn contains_value(&self, value: u64) -> bool {
        self.0.iter().any(|r| r.contains(value))
    }

    /// True when every interval of `other` lies inside `self`.
    pub fn covers(&self, other: &Ranges) -> bool {
        // Both sides are coalesced, so each interval of `other` must fit
        // entirely inside a single interval of `self`.
        other
            .0
            .iter()
            .all(|o| self.0.iter().any(|s| s.begin <= o.begin && o.end <= s.end))
    }

    pub fn union(&self, other: &Ranges) -> Ranges {
        let mut all = self.0.clone();
        all.extend_from_slice(&other.0);
        Ranges(coalesce(all))
    }

    pub fn difference(&self, other: &Ranges) -> Ranges {
        let mut pieces = self.0.clone();
        for cut in &other.0 {
            let mut next = Vec::with_capacity(pieces.len() + 1);
            for piece in pieces {
                if cut.end < piece.begin || cut.begin > piece.end {
                    next.push(piece);
                    continue;
                }
                if cut.begin > piece.begin {
                    next.push(Range::new(piece.begin, cut.begin - 1));
                }
                if cut.end < piece.end {
                    next.push(Range::new(cut.end + 1, piece.end));
                }
            }
            pieces = next;
        }
        Ranges(coalesce(pieces))
    }

    pub fn intersection(&self, other: &Ranges) -> Ranges {
        let mut out = Vec::new();
        let (mut i, mut j) = (0, 0);
        while i < self.0.len() && j < other.0.len() {
            let a = self.0[i];
            let b = other.0[j];
            let begin = a.begin.max(b.begin);
            let end = a.end.min(b.end);
            if begin <= end {
                out.push(Range::new(begin, end));
            }
            if a.end < b.end {
                i += 1;
            } else {
                j += 1;
            }
        }
        Ranges(coalesce(out))
    }

    /// Iterate every integer covered, lowest first.
    pub fn values(&self) -> impl Iterator<Item = u64> + '_ {
        self.0.iter().flat_map(|r| r.begin..=r.end)
    }
}

impl From<Vec<Range>> for Ranges {
    fn from(ranges: Vec<Range>) -> Self {
        Self(coalesce(ranges))
    }
}

impl From<Ranges> for Vec<Range> {
    fn from(ranges: Ranges) -> Self {
        ranges.0
    }
}

impl fmt::Display for Ranges {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, r) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{r}")?;
        }
        write!(f, "]")
    }
}

fn coalesce(mut ranges: Vec<Range>) -> Vec<Range> {
    ranges.sort();
    let mut out: Vec<Range> = Vec::with_capacity(ranges.len());
    for r in ranges {
        match out.last_mut() {
            Some(last) if r.begin <= last.end.saturating_add(1) => {
                last.end = last.end.max(r.end);
            }
            _ => out.push(r),
        }
    }
    out
}

/// A typed resource quantity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    Scalar(f64),
    Ranges(Ranges),
    Set(BTreeSet<String>),
}

impl Value {
    pub fn scalar(value: f64) -> Self {
        Value::Scalar(round_scalar(value))
    }

    pub fn ranges(ranges: impl IntoIterator<Item = (u64, u64)>) -> Self {
        Value::Ranges(Ranges::new(ranges.into_iter().map(|(b, e)| Range::new(b, e))))
    }

    pub fn set<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Self {
        Value::Set(items.into_iter().map(Into::into).collect())
    }

    /// The additive identity for a value type.
    pub fn zero(value_type: ValueType) -> Self {
        match value_type {
            ValueType::Scalar => Value::Scalar(0.0),
            ValueType::Ranges => Value::Ranges(Ranges::empty()),
            ValueType::Set => Value::Set(BTreeSet::new()),
        }
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Scalar(_) => ValueType::Scalar,
            Value::Ranges(_) => ValueType::Ranges,
            Value::Set(_) => ValueType::Set,
        }
    }

    pub fn is_zero(&self) -> bool {
        match self {
            Value::Scalar(v) => scalar_units(*v) == 0,
            Value::Ranges(r) => r.is_empty(),
            Value::Set(s) => s.is_empty(),
        }
    }

    /// True for a scalar strictly below zero.
    pub fn is_negative(&self) -> bool {
        matches!(self, Value::Scalar(v) if scalar_units(*v) < 0)
    }

    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Value::Scalar(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_ranges(&self) -> Option<&Ranges> {
        match self {
            Value::Ranges(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&BTreeSet<String>> {
        match self {
            Value::Set(s) => Some(s),
            _ => None,
        }
    }

    /// Scalar sum, range union, or set union.
    pub fn add(&self, other: &Value) -> ValueResult<Value> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::scalar(a + b)),
            (Value::Ranges(a), Value::Ranges(b)) => Ok(Value::Ranges(a.union(b))),
            (Value::Set(a), Value::Set(b)) => Ok(Value::Set(a.union(b).cloned().collect())),
            _ => Err(mismatch(self, other)),
        }
    }

    /// Scalar difference (may be negative), or range/set difference.
    ///
    /// For ranges and sets `other` must be contained in `self`.
    pub fn subtract(&self, other: &Value) -> ValueResult<Value> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::scalar(a - b)),
            (Value::Ranges(a), Value::Ranges(b)) => {
                if !a.covers(b) {
                    return Err(not_subset(self, other));
                }
                Ok(Value::Ranges(a.difference(b)))
            }
            (Value::Set(a), Value::Set(b)) => {
                if !b.is_subset(a) {
                    return Err(not_subset(self, other));
                }
                Ok(Value::Set(a.difference(b).cloned().collect()))
            }
            _ => Err(mismatch(self, other)),
        }
    }

    /// Order two values.
    ///
    /// Scalars compare numerically. Ranges and sets are `Equal` when equal,
    /// `Greater` when `self` strictly contains `other`, and `Less` otherwise,
    /// so "not `Less`" always means `self` can satisfy `other`.
    pub fn compare(&self, other: &Value) -> ValueResult<Ordering> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(scalar_units(*a).cmp(&scalar_units(*b))),
            (Value::Ranges(a), Value::Ranges(b)) => Ok(containment(a == b, a.covers(b))),
            (Value::Set(a), Value::Set(b)) => Ok(containment(a == b, b.is_subset(a))),
            _ => Err(mismatch(self, other)),
        }
    }

    /// True when `self` holds at least `other`.
    pub fn covers(&self, other: &Value) -> ValueResult<bool> {
        Ok(self.compare(other)? != Ordering::Less)
    }

    /// The portion shared by both values (scalar minimum).
    pub fn intersect(&self, other: &Value) -> ValueResult<Value> {
        match (self, other) {
            (Value::Scalar(a), Value::Scalar(b)) => Ok(Value::scalar(a.min(*b))),
            (Value::Ranges(a), Value::Ranges(b)) => Ok(Value::Ranges(a.intersection(b))),
            (Value::Set(a), Value::Set(b)) => {
                Ok(Value::Set(a.intersection(b).cloned().collect()))
            }
            _ => Err(mismatch(self, other)),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Scalar(v) => write!(f, "{v:.3}"),
            Value::Ranges(r) => write!(f, "{r}"),
            Value::Set(s) => {
                write!(f, "{{")?;
                for (i, item) in s.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{item}")?;
                }
                write!(f, "}}")
            }
        }
    }
}

fn round_scalar(value: f64) -> f64 {
    (value * SCALAR_PRECISION).round() / SCALAR_PRECISION
}

fn scalar_units(value: f64) -> i64 {
    (value * SCALAR_PRECISION).round() as i64
}

fn containment(equal: bool, covers: bool) -> Ordering {
    if equal {
        Ordering::Equal
    } else if covers {
        Ordering::Greater
    } else {
        Ordering::Less
    }
}

fn mismatch(left: &Value, right: &Value) -> ValueError {
    ValueError::TypeMismatch {
        left: left.value_type(),
        right: right.value_type(),
    }
}

fn not_subset(minuend: &Value, subtrahend: &Value) -> ValueError {
    ValueError::NotSubset {
        minuend: minuend.to_string(),
        subtrahend: subtrahend.to_string(),
    }
}
