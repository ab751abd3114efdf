//! Records and their typed property values.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use super::ObjectType;
use crate::constants::CREATED_DATE_PROPERTY;
use crate::impl_domain_status_conversions;

/// Declared data type of a property in a portal schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyKind {
    /// Free text.
    String,
    /// Numeric value.
    Number,
    /// Calendar date.
    Date,
    /// Date and time.
    Datetime,
    /// One of a fixed set of options.
    Enumeration,
    /// Boolean checkbox.
    Bool,
}

impl_domain_status_conversions!(PropertyKind {
    String => "string",
    Number => "number",
    Date => "date",
    Datetime => "datetime",
    Enumeration => "enumeration",
    Bool => "bool",
});

/// A single property value.
///
/// The remote API transports every value as a string; values are lifted
/// into this closed set once the declared [`PropertyKind`] is known.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    /// Text value.
    String(String),
    /// Numeric value.
    Number(f64),
    /// Boolean value.
    Bool(bool),
    /// Timestamp.
    Date(DateTime<Utc>),
    /// No value.
    Null,
}

/// Property bag of one record, keyed by property name.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

impl PropertyValue {
    /// Wrap a raw wire value without interpreting it.
    pub fn from_raw(raw: Option<&str>) -> Self {
        match raw {
            Some(value) => Self::String(value.to_string()),
            None => Self::Null,
        }
    }

    /// True for [`PropertyValue::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Borrow the text of a string value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Trim strings and drop values that carry no information.
    ///
    /// Empty strings and the literals `none`/`null` count as absent.
    pub fn clean(self) -> Option<Self> {
        match self {
            Self::Null => None,
            Self::Number(n) if !n.is_finite() => None,
            Self::String(value) => {
                let trimmed = value.trim();
                if trimmed.is_empty()
                    || trimmed.eq_ignore_ascii_case("none")
                    || trimmed.eq_ignore_ascii_case("null")
                {
                    None
                } else {
                    Some(Self::String(trimmed.to_string()))
                }
            }
            other => Some(other),
        }
    }

    /// Lift a value into the representation matching `kind`.
    ///
    /// Values that do not parse stay as strings; the destination's own
    /// validation decides whether they are acceptable.
    pub fn coerce(self, kind: PropertyKind) -> Self {
        let raw = match self {
            Self::String(raw) => raw,
            other => return other,
        };

        let coerced = match kind {
            PropertyKind::Number => raw.parse::<f64>().ok().filter(|n| n.is_finite()).map(Self::Number),
            PropertyKind::Bool => match raw.to_lowercase().as_str() {
                "true" | "yes" | "1" => Some(Self::Bool(true)),
                "false" | "no" | "0" => Some(Self::Bool(false)),
                _ => None,
            },
            PropertyKind::Date | PropertyKind::Datetime => parse_timestamp(&raw).map(Self::Date),
            PropertyKind::String | PropertyKind::Enumeration => None,
        };

        coerced.unwrap_or(Self::String(raw))
    }

    /// Interpret the value as a point in time, if possible.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Date(value) => Some(*value),
            Self::String(raw) => parse_timestamp(raw),
            Self::Number(n) if n.is_finite() => Utc.timestamp_millis_opt(*n as i64).single(),
            _ => None,
        }
    }

    /// Render the value the way the REST API expects it.
    ///
    /// Dates are sent as epoch milliseconds, integral numbers without a
    /// fractional part.
    pub fn to_wire(&self) -> Option<String> {
        match self {
            Self::String(value) => Some(value.clone()),
            Self::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => Some(format!("{}", *n as i64)),
            Self::Number(n) => Some(n.to_string()),
            Self::Bool(value) => Some(value.to_string()),
            Self::Date(value) => Some(value.timestamp_millis().to_string()),
            Self::Null => None,
        }
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<DateTime<Utc>> for PropertyValue {
    fn from(value: DateTime<Utc>) -> Self {
        Self::Date(value)
    }
}

/// Parse RFC 3339, epoch milliseconds or a bare `YYYY-MM-DD` date.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    if let Ok(millis) = raw.parse::<i64>() {
        return Utc.timestamp_millis_opt(millis).single();
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// One CRM record as read from a portal.
///
/// `id` is portal-local and means nothing in any other portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Source id.
    pub id: String,
    /// Type of the record.
    pub object_type: ObjectType,
    /// Property values by name.
    pub properties: PropertyMap,
    /// Creation time, when known.
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification time, when known.
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record {
    /// An empty record.
    pub fn new(id: impl Into<String>, object_type: ObjectType) -> Self {
        Self {
            id: id.into(),
            object_type,
            properties: PropertyMap::new(),
            created_at: None,
            updated_at: None,
        }
    }

    /// Set a property value.
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    /// Set the creation time.
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// String form of a property, ignoring null and empty values.
    pub fn property_str(&self, name: &str) -> Option<&str> {
        self.properties.get(name).and_then(PropertyValue::as_str).filter(|v| !v.trim().is_empty())
    }

    /// Creation time, falling back to the `createdate` property.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created_at
            .or_else(|| self.properties.get(CREATED_DATE_PROPERTY).and_then(PropertyValue::as_timestamp))
    }
}
