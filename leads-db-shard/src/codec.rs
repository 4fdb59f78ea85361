//! Shard payload codec
//!
//! A shard document keeps its leads under `items`, in one of two shapes:
//!
//! - list encoding (legacy): `items` is an array of lead objects
//! - dictionary encoding (current): `items` maps lead id to lead object
//!
//! The shape is decoded once per read into [`ShardPayload`]; everything
//! downstream works on that value and only the write path re-encodes it.
//! A shard document without `items` decodes as an empty dictionary.

use crate::directory::ShardId;
use crate::error::{Result, ShardError};
use crate::record::Lead;
use leads_db_core::{Document, FieldPath};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::warn;

/// Field holding the shard's leads.
pub const ITEMS_FIELD: &str = "items";

/// Path of one lead inside a dictionary-encoded shard.
pub fn item_path(lead_id: &str) -> FieldPath {
    FieldPath::new([ITEMS_FIELD, lead_id])
}

/// Physical encoding of a shard payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    List,
    Dictionary,
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Encoding::List => f.write_str("list"),
            Encoding::Dictionary => f.write_str("dictionary"),
        }
    }
}

/// Decoded shard contents.
#[derive(Debug, Clone, PartialEq)]
pub enum ShardPayload {
    List(Vec<Lead>),
    Dictionary(BTreeMap<String, Lead>),
}

impl ShardPayload {
    /// Empty payload in the given encoding.
    pub fn empty(encoding: Encoding) -> Self {
        match encoding {
            Encoding::List => ShardPayload::List(Vec::new()),
            Encoding::Dictionary => ShardPayload::Dictionary(BTreeMap::new()),
        }
    }

    /// Build a payload in the given encoding from leads.
    ///
    /// For the dictionary encoding the first lead with a given id wins.
    pub fn from_leads(encoding: Encoding, leads: Vec<Lead>) -> Self {
        match encoding {
            Encoding::List => ShardPayload::List(leads),
            Encoding::Dictionary => {
                let mut map = BTreeMap::new();
                for lead in leads {
                    map.entry(lead.id.clone()).or_insert(lead);
                }
                ShardPayload::Dictionary(map)
            }
        }
    }

    /// Decode the `items` field of a shard document.
    pub fn decode(shard_id: &ShardId, doc: &Document) -> Result<Self> {
        match doc.get(ITEMS_FIELD) {
            None | Some(Value::Null) => Ok(ShardPayload::Dictionary(BTreeMap::new())),
            Some(Value::Array(items)) => {
                let mut leads = Vec::with_capacity(items.len());
                for (pos, item) in items.iter().enumerate() {
                    let lead = Lead::from_value(item.clone()).map_err(|e| {
                        ShardError::invalid_shard(
                            shard_id.as_str(),
                            format!("item {pos} is not a lead: {e}"),
                        )
                    })?;
                    leads.push(lead);
                }
                Ok(ShardPayload::List(leads))
            }
            Some(Value::Object(items)) => {
                let mut leads = BTreeMap::new();
                for (key, item) in items {
                    let mut item = item.clone();
                    let Some(fields) = item.as_object_mut() else {
                        return Err(ShardError::invalid_shard(
                            shard_id.as_str(),
                            format!("item '{key}' is not an object"),
                        ));
                    };
                    let stored_id = fields.get("id").and_then(Value::as_str).map(str::to_owned);
                    if stored_id.as_deref() != Some(key.as_str()) {
                        if let Some(stored_id) = stored_id {
                            warn!(
                                shard_id = %shard_id,
                                key = %key,
                                stored_id = %stored_id,
                                "Lead id differs from its key; key wins"
                            );
                        }
                        fields.insert("id".into(), Value::String(key.clone()));
                    }
                    let lead = Lead::from_value(item).map_err(|e| {
                        ShardError::invalid_shard(
                            shard_id.as_str(),
                            format!("item '{key}' is not a lead: {e}"),
                        )
                    })?;
                    leads.insert(key.clone(), lead);
                }
                Ok(ShardPayload::Dictionary(leads))
            }
            Some(other) => Err(ShardError::invalid_shard(
                shard_id.as_str(),
                format!("items is neither a list nor a dictionary: {other}"),
            )),
        }
    }

    /// Encode as a shard document in the payload's own encoding.
    pub fn encode(&self) -> Result<Document> {
        let items = match self {
            ShardPayload::List(leads) => Value::Array(
                leads
                    .iter()
                    .map(Lead::to_value)
                    .collect::<Result<Vec<_>>>()?,
            ),
            ShardPayload::Dictionary(leads) => {
                let mut map = Map::new();
                for (id, lead) in leads {
                    map.insert(id.clone(), lead.to_value()?);
                }
                Value::Object(map)
            }
        };
        let mut doc = Document::new();
        doc.insert(ITEMS_FIELD.to_string(), items);
        Ok(doc)
    }

    pub fn encoding(&self) -> Encoding {
        match self {
            ShardPayload::List(_) => Encoding::List,
            ShardPayload::Dictionary(_) => Encoding::Dictionary,
        }
    }

    /// Record count, independent of encoding.
    pub fn len(&self) -> usize {
        match self {
            ShardPayload::List(leads) => leads.len(),
            ShardPayload::Dictionary(leads) => leads.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every lead, in list order or key order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = &Lead> + '_> {
        match self {
            ShardPayload::List(leads) => Box::new(leads.iter()),
            ShardPayload::Dictionary(leads) => Box::new(leads.values()),
        }
    }

    /// Find a lead by id: keyed lookup for dictionaries, linear scan for lists.
    pub fn locate(&self, id: &str) -> Option<&Lead> {
        match self {
            ShardPayload::List(leads) => leads.iter().find(|lead| lead.id == id),
            ShardPayload::Dictionary(leads) => leads.get(id),
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.locate(id).is_some()
    }

    /// Dictionary form of this payload; the input is left untouched.
    ///
    /// Duplicate ids in a list keep their first occurrence, which is also the
    /// one `locate` returns.
    pub fn to_dictionary(&self) -> ShardPayload {
        match self {
            ShardPayload::Dictionary(_) => self.clone(),
            ShardPayload::List(leads) => {
                ShardPayload::from_leads(Encoding::Dictionary, leads.clone())
            }
        }
    }

    /// Consume into leads, in iteration order.
    pub fn into_leads(self) -> Vec<Lead> {
        match self {
            ShardPayload::List(leads) => leads,
            ShardPayload::Dictionary(leads) => leads.into_values().collect(),
        }
    }

    /// Insert or replace a lead, keeping the encoding.
    pub fn upsert(&mut self, lead: Lead) {
        match self {
            ShardPayload::List(leads) => {
                match leads.iter_mut().find(|existing| existing.id == lead.id) {
                    Some(existing) => *existing = lead,
                    None => leads.push(lead),
                }
            }
            ShardPayload::Dictionary(leads) => {
                leads.insert(lead.id.clone(), lead);
            }
        }
    }

    /// Remove a lead by id, returning it if present. Lists drop every
    /// occurrence of the id.
    pub fn remove(&mut self, id: &str) -> Option<Lead> {
        match self {
            ShardPayload::List(leads) => {
                let removed = leads.iter().find(|lead| lead.id == id).cloned();
                leads.retain(|lead| lead.id != id);
                removed
            }
            ShardPayload::Dictionary(leads) => leads.remove(id),
        }
    }
}
