//! Per-activeflow variable bags and `${name}` substitution.

use crate::domain::activeflow::ActiveflowId;
use crate::domain::option::OptionValue;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::bytes::{Captures as ByteCaptures, Regex as ByteRegex};
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^${}]+)\}").expect("placeholder pattern is valid"));

static PLACEHOLDER_BYTES: Lazy<ByteRegex> =
    Lazy::new(|| ByteRegex::new(r"\$\{([^${}]+)\}").expect("placeholder pattern is valid"));

/// Variable key holding the digits received on a call
pub const KEY_CALL_DIGITS: &str = "call.digits";

/// Variable key holding the activeflow id
pub const KEY_ACTIVEFLOW_ID: &str = "activeflow.id";

/// Variable key holding the flow id
pub const KEY_ACTIVEFLOW_FLOW_ID: &str = "activeflow.flow_id";

/// Variable key holding the reference type
pub const KEY_ACTIVEFLOW_REFERENCE_TYPE: &str = "activeflow.reference_type";

/// Variable key holding the reference id
pub const KEY_ACTIVEFLOW_REFERENCE_ID: &str = "activeflow.reference_id";

/// Variable key holding the spawning activeflow's id
pub const KEY_ACTIVEFLOW_REFERENCE_ACTIVEFLOW_ID: &str = "activeflow.reference_activeflow_id";

/// The variable bag of one activeflow
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variable {
    /// Owning activeflow
    pub id: ActiveflowId,

    /// Name to value
    pub variables: HashMap<String, String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last updated timestamp
    pub updated_at: DateTime<Utc>,
}

impl Variable {
    /// Create a bag
    pub fn new(id: ActiveflowId, variables: HashMap<String, String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            variables,
            created_at: now,
            updated_at: now,
        }
    }

    /// Value of a variable, if set
    pub fn get(&self, key: &str) -> Option<&str> {
        self.variables.get(key).map(String::as_str)
    }

    /// Merge values into the bag, overwriting existing keys
    pub fn merge(&mut self, values: HashMap<String, String>) {
        self.variables.extend(values);
        self.updated_at = Utc::now();
    }

    /// Remove a variable, returning its value
    pub fn remove(&mut self, key: &str) -> Option<String> {
        let removed = self.variables.remove(key);
        if removed.is_some() {
            self.updated_at = Utc::now();
        }
        removed
    }
}

/// Replace every `${name}` in `data` with the bag's value; unknown names
/// become the empty string.
pub fn substitute_string(data: &str, variables: &HashMap<String, String>) -> String {
    PLACEHOLDER
        .replace_all(data, |caps: &Captures| {
            variables.get(&caps[1]).cloned().unwrap_or_default()
        })
        .into_owned()
}

/// Byte-level counterpart of [`substitute_string`]
pub fn substitute_bytes(data: &[u8], variables: &HashMap<String, String>) -> Vec<u8> {
    PLACEHOLDER_BYTES
        .replace_all(data, |caps: &ByteCaptures| {
            let name = String::from_utf8_lossy(&caps[1]);
            variables
                .get(name.as_ref())
                .map(|v| v.as_bytes().to_vec())
                .unwrap_or_default()
        })
        .into_owned()
}

/// Substitute every text and byte leaf of an option tree. Map keys and
/// scalars are left alone.
pub fn substitute_option(data: &OptionValue, variables: &HashMap<String, String>) -> OptionValue {
    match data {
        OptionValue::Text(s) => OptionValue::Text(substitute_string(s, variables)),
        OptionValue::Bytes(b) => OptionValue::Bytes(substitute_bytes(b, variables)),
        OptionValue::List(items) => OptionValue::List(
            items
                .iter()
                .map(|item| substitute_option(item, variables))
                .collect(),
        ),
        OptionValue::Map(map) => OptionValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), substitute_option(v, variables)))
                .collect(),
        ),
        OptionValue::Scalar(v) => OptionValue::Scalar(v.clone()),
    }
}

/// Substitute a raw JSON option payload
pub fn substitute_json(data: &serde_json::Value, variables: &HashMap<String, String>) -> serde_json::Value {
    let tree = OptionValue::from(data.clone());
    substitute_option(&tree, variables).into()
}
