use super::{FieldId, ObjectId};
use crate::error::ValidationError;
use serde::{Deserialize, Serialize};

/// The data type of a catalog field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldType {
    Text,
    Paragraph,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Email,
    Phone,
    Url,
    Dropdown,
    MultiSelect,
    Reference,
    Attachment,
}

impl FieldType {
    /// Types whose values are picked from `Field::options`.
    pub fn has_options(&self) -> bool {
        matches!(self, FieldType::Dropdown | FieldType::MultiSelect)
    }

    pub fn is_reference(&self) -> bool {
        matches!(self, FieldType::Reference)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RefMultiplicity {
    Single,
    Multi,
}

/// A globally defined data element, owned by the field catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Absent until the field has been persisted.
    #[serde(default)]
    pub id: Option<FieldId>,
    pub name: String,
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub primary: Option<bool>,
    #[serde(default)]
    pub sample_value: Option<String>,
    #[serde(default)]
    pub ref_object_id: Option<ObjectId>,
    #[serde(default)]
    pub ref_multiplicity: Option<RefMultiplicity>,
}

/// The user-supplied definition of a field that does not exist yet.
///
/// `required` is not a field property: it becomes the binding-local flag of the
/// `FieldReference` created when the new field is attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDraft {
    pub label: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub primary: Option<bool>,
    #[serde(default)]
    pub sample_value: Option<String>,
    #[serde(default)]
    pub ref_object_id: Option<ObjectId>,
    #[serde(default)]
    pub ref_multiplicity: Option<RefMultiplicity>,
    #[serde(default)]
    pub required: bool,
}

impl FieldDraft {
    pub fn new(label: &str, field_type: FieldType) -> Self {
        Self {
            label: label.to_string(),
            field_type,
            options: None,
            primary: None,
            sample_value: None,
            ref_object_id: None,
            ref_multiplicity: None,
            required: false,
        }
    }

    pub fn with_options(mut self, options: &[&str]) -> Self {
        self.options = Some(options.iter().map(|o| o.to_string()).collect());
        self
    }

    pub fn with_reference(mut self, object_id: ObjectId, multiplicity: RefMultiplicity) -> Self {
        self.ref_object_id = Some(object_id);
        self.ref_multiplicity = Some(multiplicity);
        self
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Checks the draft before anything is sent to storage.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.label.trim().is_empty() {
            return Err(ValidationError::EmptyLabel);
        }
        if self.field_type.has_options()
            && self.options.as_ref().is_none_or(|opts| opts.is_empty())
        {
            return Err(ValidationError::MissingOptions(self.label.clone()));
        }
        if self.field_type.is_reference() && self.ref_object_id.is_none() {
            return Err(ValidationError::MissingReferenceObject(self.label.clone()));
        }
        Ok(())
    }

    /// Materializes the draft as an unpersisted field carrying the given name.
    pub fn into_field(self, name: String) -> Field {
        Field {
            id: None,
            name,
            label: self.label,
            field_type: self.field_type,
            options: self.options,
            primary: self.primary,
            sample_value: self.sample_value,
            ref_object_id: self.ref_object_id,
            ref_multiplicity: self.ref_multiplicity,
        }
    }
}

/// A partial update of an existing field. `None` leaves the property untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldPatch {
    pub id: FieldId,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub primary: Option<bool>,
    #[serde(default)]
    pub sample_value: Option<String>,
}

impl FieldPatch {
    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.label {
            Some(label) if label.trim().is_empty() => Err(ValidationError::EmptyLabel),
            _ => Ok(()),
        }
    }

    pub fn apply(&self, field: &mut Field) {
        if let Some(label) = &self.label {
            field.label = label.clone();
        }
        if let Some(options) = &self.options {
            field.options = Some(options.clone());
        }
        if let Some(primary) = self.primary {
            field.primary = Some(primary);
        }
        if let Some(sample) = &self.sample_value {
            field.sample_value = Some(sample.clone());
        }
    }
}

/// A weak reference to a catalog field plus binding-local metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldReference {
    pub field_id: FieldId,
    #[serde(default)]
    pub required: bool,
}

impl FieldReference {
    pub fn new(field_id: FieldId) -> Self {
        Self {
            field_id,
            required: false,
        }
    }

    pub fn required(field_id: FieldId) -> Self {
        Self {
            field_id,
            required: true,
        }
    }
}
