//! Typed links between records.

use serde::{Deserialize, Serialize};

use super::ObjectType;

/// Who defined an association type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssociationCategory {
    /// Built into the platform.
    HubspotDefined,
    /// Created by a portal user.
    UserDefined,
    /// Created by an app.
    IntegratorDefined,
}

/// Category plus numeric type id of a labelled association.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssociationLabel {
    /// Who defined the type.
    pub category: AssociationCategory,
    /// Numeric type id within the category.
    pub type_id: u32,
}

/// One end of an association.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Type of the record.
    pub object_type: ObjectType,
    /// Record id in its portal.
    pub id: String,
}

impl ObjectRef {
    /// Reference to one record.
    pub fn new(object_type: ObjectType, id: impl Into<String>) -> Self {
        Self { object_type, id: id.into() }
    }
}

/// A link as read from a portal. Ids are local to that portal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Association {
    /// Source end.
    pub from: ObjectRef,
    /// Target end.
    pub to: ObjectRef,
    /// `None` means the default (unlabelled) association.
    #[serde(default)]
    pub label: Option<AssociationLabel>,
}

impl Association {
    /// An unlabelled link.
    pub fn new(from: ObjectRef, to: ObjectRef) -> Self {
        Self { from, to, label: None }
    }

    /// Attach a label.
    pub fn with_label(mut self, label: AssociationLabel) -> Self {
        self.label = Some(label);
        self
    }
}

/// Id pair for batch association calls within one `(from, to)` type pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AssociationPair {
    /// Id on the `from` side.
    pub from_id: String,
    /// Id on the `to` side.
    pub to_id: String,
    /// `None` means the default association.
    #[serde(default)]
    pub label: Option<AssociationLabel>,
}

impl AssociationPair {
    /// An unlabelled pair.
    pub fn new(from_id: impl Into<String>, to_id: impl Into<String>) -> Self {
        Self { from_id: from_id.into(), to_id: to_id.into(), label: None }
    }

    /// Same link seen from the other end.
    pub fn reversed(&self) -> Self {
        Self { from_id: self.to_id.clone(), to_id: self.from_id.clone(), label: self.label }
    }
}

/// Result of a batch association create.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssociationBatchOutcome {
    /// Links written.
    pub created: Vec<AssociationPair>,
    /// Rejected by the portal because the link already exists.
    pub duplicates: Vec<AssociationPair>,
    /// Links rejected, with the error text.
    pub failed: Vec<(AssociationPair, String)>,
}

impl AssociationBatchOutcome {
    /// Append another batch's results.
    pub fn merge(&mut self, other: AssociationBatchOutcome) {
        self.created.extend(other.created);
        self.duplicates.extend(other.duplicates);
        self.failed.extend(other.failed);
    }
}
