//! Lead records and the inputs used to create and patch them

use crate::directory::ShardId;
use crate::error::{Result, ShardError};
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Fields managed by the store itself; never taken from `extra`.
const RESERVED_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];

/// A stored B2B lead.
///
/// Field names match the persisted JSON. Fields the store does not know about
/// are kept in `extra` so older payloads survive a rewrite unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    /// Unique, immutable identifier
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    /// Contact number; mandatory on creation
    #[serde(default, deserialize_with = "string_or_number")]
    pub phone: String,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    /// Organization
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub business_name: Option<String>,
    /// Region
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub state: Option<String>,
    /// Sub-region
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub district: Option<String>,
    /// Postal code
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub pincode: Option<String>,
    /// `New`, `Contacted`, `Converted` or `Lost` by convention
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,
    /// Assigned key account manager
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub kam: Option<String>,
    #[serde(
        rename = "createdAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub created_at: Option<String>,
    #[serde(
        rename = "updatedAt",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Lead {
    /// Minimal lead with only the mandatory fields.
    pub fn new(id: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            phone: phone.into(),
            name: None,
            business_name: None,
            state: None,
            district: None,
            pincode: None,
            status: None,
            kam: None,
            created_at: None,
            updated_at: None,
            extra: Map::new(),
        }
    }

    /// Decode a lead from a stored JSON value.
    pub fn from_value(value: Value) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_value(value)
    }

    /// Encode the lead as a JSON value.
    pub fn to_value(&self) -> Result<Value> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Legacy rows sometimes carry phone numbers and ids as JSON numbers.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_string_or_number(deserializer)?.unwrap_or_default())
}

/// Scalar text field that may have been stored as a number or boolean
/// (a numeric `pincode` is common).
fn opt_string_or_number<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Null => Ok(None),
        other => Err(serde::de::Error::custom(format!(
            "expected a string or number, found {other}"
        ))),
    }
}

/// RFC 3339 timestamp for `createdAt` / `updatedAt`.
pub(crate) fn now_timestamp() -> String {
    Utc::now().to_rfc3339()
}

/// Generate a unique lead id (lowercase ULID).
pub fn generate_lead_id() -> String {
    ulid::Ulid::new().to_string().to_lowercase()
}

/// Input for `add` and `import_batch`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadInput {
    /// Caller-chosen id; generated when absent
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub phone: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub business_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub state: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub district: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub pincode: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub status: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub kam: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LeadInput {
    pub fn new(phone: impl Into<String>) -> Self {
        Self {
            phone: Some(phone.into()),
            ..Self::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn business_name(mut self, business_name: impl Into<String>) -> Self {
        self.business_name = Some(business_name.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Check the mandatory fields without consuming the input.
    pub fn validate(&self) -> Result<()> {
        match self.phone.as_deref().map(str::trim) {
            Some(phone) if !phone.is_empty() => {}
            _ => return Err(ShardError::validation("phone number is mandatory")),
        }
        if let Some(id) = &self.id {
            if id.trim().is_empty() {
                return Err(ShardError::validation("lead id must not be blank"));
            }
        }
        Ok(())
    }

    /// Turn the input into a stored lead, assigning an id if needed and
    /// stamping both timestamps with `now`.
    pub fn into_lead(self, now: &str) -> Result<Lead> {
        self.validate()?;
        let mut extra = self.extra;
        for key in RESERVED_FIELDS {
            extra.remove(key);
        }
        Ok(Lead {
            id: self.id.unwrap_or_else(generate_lead_id),
            phone: self.phone.unwrap_or_default(),
            name: self.name,
            business_name: self.business_name,
            state: self.state,
            district: self.district,
            pincode: self.pincode,
            status: self.status,
            kam: self.kam,
            created_at: Some(now.to_string()),
            updated_at: Some(now.to_string()),
            extra,
        })
    }
}

/// Partial update for an existing lead. Unset fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub business_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub district: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pincode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kam: Option<String>,
    /// Additional fields; a `null` value removes the field
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl LeadPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn business_name(mut self, business_name: impl Into<String>) -> Self {
        self.business_name = Some(business_name.into());
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn district(mut self, district: impl Into<String>) -> Self {
        self.district = Some(district.into());
        self
    }

    pub fn pincode(mut self, pincode: impl Into<String>) -> Self {
        self.pincode = Some(pincode.into());
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn kam(mut self, kam: impl Into<String>) -> Self {
        self.kam = Some(kam.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.phone.is_none()
            && self.name.is_none()
            && self.business_name.is_none()
            && self.state.is_none()
            && self.district.is_none()
            && self.pincode.is_none()
            && self.status.is_none()
            && self.kam.is_none()
            && self.extra.is_empty()
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(phone) = &self.phone {
            if phone.trim().is_empty() {
                return Err(ShardError::validation("phone number must not be blank"));
            }
        }
        if let Some(key) = RESERVED_FIELDS
            .iter()
            .find(|key| self.extra.contains_key(**key))
        {
            return Err(ShardError::validation(format!("field '{key}' cannot be patched")));
        }
        Ok(())
    }

    /// Merge into `lead` and stamp `updatedAt`.
    pub fn apply(&self, lead: &mut Lead, now: &str) {
        fn merge(target: &mut Option<String>, value: &Option<String>) {
            if let Some(v) = value {
                *target = Some(v.clone());
            }
        }

        if let Some(phone) = &self.phone {
            lead.phone = phone.clone();
        }
        merge(&mut lead.name, &self.name);
        merge(&mut lead.business_name, &self.business_name);
        merge(&mut lead.state, &self.state);
        merge(&mut lead.district, &self.district);
        merge(&mut lead.pincode, &self.pincode);
        merge(&mut lead.status, &self.status);
        merge(&mut lead.kam, &self.kam);
        for (key, value) in &self.extra {
            if value.is_null() {
                lead.extra.remove(key);
            } else {
                lead.extra.insert(key.clone(), value.clone());
            }
        }
        lead.updated_at = Some(now.to_string());
    }
}

/// A lead tagged with the shard it was read from.
///
/// The shard id is an opaque hint for `update` / `delete`, not part of the
/// lead's identity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ShardedLead {
    #[serde(flatten)]
    pub lead: Lead,
    #[serde(rename = "_shard")]
    pub shard_id: ShardId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn input_requires_phone() {
        let err = LeadInput::default().into_lead("t").unwrap_err();
        assert!(matches!(err, ShardError::Validation(_)));

        let err = LeadInput::new("   ").into_lead("t").unwrap_err();
        assert!(matches!(err, ShardError::Validation(_)));
    }

    #[test]
    fn input_assigns_unique_ids_and_stamps() {
        let a = LeadInput::new("111").into_lead("2026-01-01T00:00:00Z").unwrap();
        let b = LeadInput::new("222").into_lead("2026-01-01T00:00:00Z").unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.id.len(), 26);
        assert_eq!(a.created_at.as_deref(), Some("2026-01-01T00:00:00Z"));
        assert_eq!(a.updated_at, a.created_at);

        let c = LeadInput::new("333").with_id("c").into_lead("t").unwrap();
        assert_eq!(c.id, "c");
    }

    #[test]
    fn lead_round_trips_unknown_fields() {
        let value = json!({
            "id": "a",
            "phone": "111",
            "status": "New",
            "source": "expo-2024",
            "createdAt": "2024-01-01T00:00:00Z"
        });
        let lead = Lead::from_value(value.clone()).unwrap();
        assert_eq!(lead.extra["source"], json!("expo-2024"));
        assert_eq!(lead.to_value().unwrap(), value);
    }

    #[test]
    fn numeric_phone_is_accepted() {
        let lead = Lead::from_value(json!({"id": "a", "phone": 919876543210u64})).unwrap();
        assert_eq!(lead.phone, "919876543210");
    }

    #[test]
    fn numeric_descriptive_fields_are_accepted() {
        let lead = Lead::from_value(json!({
            "id": 42,
            "phone": "1",
            "pincode": 682001,
            "status": null
        }))
        .unwrap();
        assert_eq!(lead.id, "42");
        assert_eq!(lead.pincode.as_deref(), Some("682001"));
        assert_eq!(lead.status, None);

        let input: LeadInput =
            serde_json::from_value(json!({"phone": 98765, "pincode": 560001})).unwrap();
        assert_eq!(input.phone.as_deref(), Some("98765"));
        assert_eq!(input.pincode.as_deref(), Some("560001"));

        assert!(Lead::from_value(json!({"id": "a", "phone": "1", "kam": ["x"]})).is_err());
    }

    #[test]
    fn patch_preserves_unspecified_fields() {
        let mut lead = Lead::new("b", "222");
        lead.name = Some("Acme".into());
        lead.extra.insert("source".into(), json!("web"));

        LeadPatch::new()
            .status("Converted")
            .field("source", Value::Null)
            .apply(&mut lead, "later");

        assert_eq!(lead.status.as_deref(), Some("Converted"));
        assert_eq!(lead.name.as_deref(), Some("Acme"));
        assert_eq!(lead.phone, "222");
        assert!(!lead.extra.contains_key("source"));
        assert_eq!(lead.updated_at.as_deref(), Some("later"));
    }

    #[test]
    fn patch_cannot_touch_identity() {
        let patch = LeadPatch::new().field("id", json!("other"));
        assert!(patch.validate().is_err());
        assert!(LeadPatch::new().phone("").validate().is_err());
        assert!(LeadPatch::new().is_empty());
    }
}
