//! CRM object type tags.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{CONTACT_MODIFIED_DATE_PROPERTY, MODIFIED_DATE_PROPERTY};

/// A category of CRM record.
///
/// Serialized as its display form (`contact`, `deal`, `custom:<name>`) so it
/// can key JSON maps in reports.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum ObjectType {
    /// Contacts.
    Contact,
    /// Companies.
    Company,
    /// Deals.
    Deal,
    /// Tickets.
    Ticket,
    /// Portal-defined object type, identified by its schema name.
    Custom(String),
}

impl ObjectType {
    /// Built-in object types in migration order.
    pub const STANDARD: [ObjectType; 4] =
        [ObjectType::Contact, ObjectType::Company, ObjectType::Deal, ObjectType::Ticket];

    /// A custom type by schema name.
    pub fn custom(name: impl Into<String>) -> Self {
        Self::Custom(name.into())
    }

    /// True for portal-defined types.
    pub fn is_custom(&self) -> bool {
        matches!(self, Self::Custom(_))
    }

    /// Deals and tickets move through pipelines.
    pub fn has_pipelines(&self) -> bool {
        matches!(self, Self::Deal | Self::Ticket)
    }

    /// Path segment used by the REST API.
    pub fn api_name(&self) -> &str {
        match self {
            Self::Contact => "contacts",
            Self::Company => "companies",
            Self::Deal => "deals",
            Self::Ticket => "tickets",
            Self::Custom(name) => name,
        }
    }

    /// Record properties holding the pipeline id and the stage id.
    pub fn pipeline_properties(&self) -> Option<(&'static str, &'static str)> {
        match self {
            Self::Deal => Some(("pipeline", "dealstage")),
            Self::Ticket => Some(("hs_pipeline", "hs_pipeline_stage")),
            _ => None,
        }
    }

    /// Property holding the last-modified time.
    pub fn modified_date_property(&self) -> &'static str {
        match self {
            Self::Contact => CONTACT_MODIFIED_DATE_PROPERTY,
            _ => MODIFIED_DATE_PROPERTY,
        }
    }

    /// Position in the record phase; custom objects run last.
    pub fn migration_rank(&self) -> u8 {
        match self {
            Self::Contact => 0,
            Self::Company => 1,
            Self::Deal => 2,
            Self::Ticket => 3,
            Self::Custom(_) => 4,
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Contact => write!(f, "contact"),
            Self::Company => write!(f, "company"),
            Self::Deal => write!(f, "deal"),
            Self::Ticket => write!(f, "ticket"),
            Self::Custom(name) => write!(f, "custom:{name}"),
        }
    }
}

impl FromStr for ObjectType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if let Some(name) = trimmed.strip_prefix("custom:") {
            let name = name.trim();
            if name.is_empty() {
                return Err("custom object type needs a name (custom:<name>)".to_string());
            }
            return Ok(Self::Custom(name.to_string()));
        }

        match trimmed.to_lowercase().as_str() {
            "contact" | "contacts" => Ok(Self::Contact),
            "company" | "companies" => Ok(Self::Company),
            "deal" | "deals" => Ok(Self::Deal),
            "ticket" | "tickets" => Ok(Self::Ticket),
            _ => Err(format!("Invalid ObjectType: {s}")),
        }
    }
}

impl From<ObjectType> for String {
    fn from(value: ObjectType) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for ObjectType {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
