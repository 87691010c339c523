//! Conference query compiler.
//!
//! Turns loosely-typed `(field, operator, value)` criteria into a validated
//! [`QueryPlan`]. The target query model can range-filter only one field per
//! query, so at most one distinct field may carry a non-equality operator, and
//! that field must lead the sort order.
//!
//! Compilation is pure: it never touches storage. Stores either translate a
//! plan to their own query language or evaluate it in memory with
//! [`QueryPlan::matches`] and [`QueryPlan::compare`].
//!
//! # Example
//!
//! ```
//! use conference_core::query::{compile, Criterion, Field, SortKey};
//!
//! let plan = compile(&[
//!     Criterion::new("MAX_ATTENDEES", "GT", "10"),
//!     Criterion::new("MONTH", "EQ", "6"),
//! ])
//! .unwrap();
//!
//! assert_eq!(plan.inequality_field(), Some(Field::MaxAttendees));
//! assert_eq!(plan.sort(), &[SortKey::Field(Field::MaxAttendees), SortKey::Name]);
//! ```

use crate::error::ConferenceError;
use crate::types::Conference;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Conference attribute a criterion may filter on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    /// `CITY`: the conference city
    City,
    /// `TOPIC`: any of the conference topics
    Topic,
    /// `MONTH`: month of the start date
    Month,
    /// `MAX_ATTENDEES`: conference capacity
    MaxAttendees,
}

impl Field {
    /// Symbol accepted in criteria.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::City => "CITY",
            Self::Topic => "TOPIC",
            Self::Month => "MONTH",
            Self::MaxAttendees => "MAX_ATTENDEES",
        }
    }

    /// Name of the conference attribute the field targets.
    #[must_use]
    pub const fn attribute(self) -> &'static str {
        match self {
            Self::City => "city",
            Self::Topic => "topics",
            Self::Month => "month",
            Self::MaxAttendees => "maxAttendees",
        }
    }

    /// Whether values for this field are coerced to integers.
    #[must_use]
    pub const fn is_numeric(self) -> bool {
        matches!(self, Self::Month | Self::MaxAttendees)
    }
}

impl FromStr for Field {
    type Err = ConferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CITY" => Ok(Self::City),
            "TOPIC" => Ok(Self::Topic),
            "MONTH" => Ok(Self::Month),
            "MAX_ATTENDEES" => Ok(Self::MaxAttendees),
            _ => Err(ConferenceError::validation(format!(
                "Filter contains invalid field: {s}"
            ))),
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `EQ`: `=`
    Eq,
    /// `GT`: `>`
    Gt,
    /// `GTEQ`: `>=`
    GtEq,
    /// `LT`: `<`
    Lt,
    /// `LTEQ`: `<=`
    LtEq,
    /// `NE`: `!=`
    Ne,
}

impl Operator {
    /// Symbol accepted in criteria.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "EQ",
            Self::Gt => "GT",
            Self::GtEq => "GTEQ",
            Self::Lt => "LT",
            Self::LtEq => "LTEQ",
            Self::Ne => "NE",
        }
    }

    /// Comparison token (`=`, `>`, ...).
    #[must_use]
    pub const fn token(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Gt => ">",
            Self::GtEq => ">=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Ne => "!=",
        }
    }

    /// Everything except `EQ` is an inequality.
    #[must_use]
    pub const fn is_inequality(self) -> bool {
        !matches!(self, Self::Eq)
    }

    /// Whether `attribute <op> value` holds, given `attribute.cmp(value)`.
    #[must_use]
    pub const fn holds(self, ordering: Ordering) -> bool {
        match self {
            Self::Eq => matches!(ordering, Ordering::Equal),
            Self::Gt => matches!(ordering, Ordering::Greater),
            Self::GtEq => !matches!(ordering, Ordering::Less),
            Self::Lt => matches!(ordering, Ordering::Less),
            Self::LtEq => !matches!(ordering, Ordering::Greater),
            Self::Ne => !matches!(ordering, Ordering::Equal),
        }
    }
}

impl FromStr for Operator {
    type Err = ConferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EQ" => Ok(Self::Eq),
            "GT" => Ok(Self::Gt),
            "GTEQ" => Ok(Self::GtEq),
            "LT" => Ok(Self::Lt),
            "LTEQ" => Ok(Self::LtEq),
            "NE" => Ok(Self::Ne),
            _ => Err(ConferenceError::validation(format!(
                "Filter contains invalid operator: {s}"
            ))),
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A raw, user-supplied filter criterion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Criterion {
    /// Field symbol, e.g. `"CITY"`
    pub field: String,
    /// Operator symbol, e.g. `"GTEQ"`
    pub operator: String,
    /// Value as text
    pub value: String,
}

impl Criterion {
    /// Create a criterion from its three parts.
    pub fn new(
        field: impl Into<String>,
        operator: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }
}

/// A typed predicate value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Value {
    /// Compared as text
    Text(String),
    /// Compared as an integer
    Integer(i64),
}

/// One validated filter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate {
    /// Attribute to test
    pub field: Field,
    /// Comparison
    pub operator: Operator,
    /// Right-hand side
    pub value: Value,
}

impl Predicate {
    /// Evaluate against a conference.
    ///
    /// `TOPIC` is list-valued: the predicate holds when any topic satisfies it.
    #[must_use]
    pub fn matches(&self, conference: &Conference) -> bool {
        match (&self.field, &self.value) {
            (Field::City, Value::Text(value)) => {
                self.operator.holds(conference.city.as_str().cmp(value.as_str()))
            }
            (Field::Topic, Value::Text(value)) => conference
                .topics
                .iter()
                .any(|topic| self.operator.holds(topic.as_str().cmp(value.as_str()))),
            (Field::Month, Value::Integer(value)) => {
                self.operator.holds(i64::from(conference.month).cmp(value))
            }
            (Field::MaxAttendees, Value::Integer(value)) => {
                self.operator.holds(i64::from(conference.max_attendees).cmp(value))
            }
            // compile() never pairs a field with the wrong value type
            _ => false,
        }
    }
}

/// A sort key in a query plan.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortKey {
    /// Sort by a filterable field
    Field(Field),
    /// Sort by conference name
    Name,
}

/// The compiled, validated form of a conference query.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueryPlan {
    predicates: Vec<Predicate>,
    sort: SmallVec<[SortKey; 2]>,
    inequality_field: Option<Field>,
}

impl QueryPlan {
    /// A plan with no filters, sorted by name.
    #[must_use]
    pub fn all() -> Self {
        Self {
            predicates: Vec::new(),
            sort: smallvec![SortKey::Name],
            inequality_field: None,
        }
    }

    /// Predicates, in the order the criteria were given.
    #[must_use]
    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Sort keys, primary first.
    #[must_use]
    pub fn sort(&self) -> &[SortKey] {
        &self.sort
    }

    /// The one field carrying non-equality operators, if any.
    #[must_use]
    pub const fn inequality_field(&self) -> Option<Field> {
        self.inequality_field
    }

    /// Whether a conference satisfies every predicate.
    #[must_use]
    pub fn matches(&self, conference: &Conference) -> bool {
        self.predicates.iter().all(|p| p.matches(conference))
    }

    /// Order two conferences by the plan's sort keys.
    ///
    /// Ties on every key fall back to the conference id so the order is total.
    #[must_use]
    pub fn compare(&self, a: &Conference, b: &Conference) -> Ordering {
        self.sort
            .iter()
            .fold(Ordering::Equal, |ordering, key| {
                ordering.then_with(|| compare_by(*key, a, b))
            })
            .then_with(|| a.id.cmp(&b.id))
    }
}

fn compare_by(key: SortKey, a: &Conference, b: &Conference) -> Ordering {
    match key {
        SortKey::Name => a.name.cmp(&b.name),
        SortKey::Field(Field::City) => a.city.cmp(&b.city),
        SortKey::Field(Field::Topic) => a.topics.iter().min().cmp(&b.topics.iter().min()),
        SortKey::Field(Field::Month) => a.month.cmp(&b.month),
        SortKey::Field(Field::MaxAttendees) => a.max_attendees.cmp(&b.max_attendees),
    }
}

/// Compile criteria into a [`QueryPlan`].
///
/// # Errors
///
/// Returns [`ConferenceError::Validation`] if:
/// - any field or operator symbol is unknown (checked for every criterion
///   before anything else),
/// - two different fields use non-equality operators,
/// - a `MONTH` or `MAX_ATTENDEES` value is not an integer.
pub fn compile(criteria: &[Criterion]) -> Result<QueryPlan, ConferenceError> {
    let parsed = criteria
        .iter()
        .map(|c| Ok((c.field.parse::<Field>()?, c.operator.parse::<Operator>()?, c)))
        .collect::<Result<Vec<_>, ConferenceError>>()?;

    let mut inequality_field: Option<Field> = None;
    for (field, operator, _) in &parsed {
        if !operator.is_inequality() {
            continue;
        }
        match inequality_field {
            Some(existing) if existing != *field => {
                return Err(ConferenceError::validation(format!(
                    "Inequality filter is allowed on only one field (found {existing} and {field})"
                )));
            }
            _ => inequality_field = Some(*field),
        }
    }

    let predicates = parsed
        .into_iter()
        .map(|(field, operator, criterion)| {
            Ok(Predicate {
                field,
                operator,
                value: coerce(field, &criterion.value)?,
            })
        })
        .collect::<Result<Vec<_>, ConferenceError>>()?;

    let sort = match inequality_field {
        Some(field) => smallvec![SortKey::Field(field), SortKey::Name],
        None => smallvec![SortKey::Name],
    };

    Ok(QueryPlan {
        predicates,
        sort,
        inequality_field,
    })
}

fn coerce(field: Field, raw: &str) -> Result<Value, ConferenceError> {
    if !field.is_numeric() {
        return Ok(Value::Text(raw.to_string()));
    }
    raw.trim().parse::<i64>().map(Value::Integer).map_err(|_| {
        ConferenceError::validation(format!("Value for {field} must be an integer, got {raw:?}"))
    })
}
