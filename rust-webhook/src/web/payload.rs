//! Install payload and wizard response types.
//!
//! Cloudflare sends the whole app install (options plus a JSON Schema) on
//! every callback and renders whatever comes back. Fields this service does
//! not own are carried through untouched via `#[serde(flatten)]`.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Parsed webhook body.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InstallPayload {
    #[serde(default)]
    pub event: Option<Value>,
    #[serde(default)]
    pub app: Option<Value>,
    #[serde(default)]
    pub install: Install,
    #[serde(default)]
    pub authentications: Option<Value>,
}

impl InstallPayload {
    /// Event name. Non-string events read as absent.
    pub fn event(&self) -> Option<&str> {
        self.event.as_ref().and_then(Value::as_str)
    }

    /// App id. Non-string ids read as absent, which counts as non-local.
    pub fn app_id(&self) -> Option<&str> {
        self.app
            .as_ref()
            .and_then(|a| a.get("id"))
            .and_then(Value::as_str)
    }

    /// Bearer token Cloudflare embeds for non-interactive callers.
    pub fn embedded_token(&self) -> Option<&str> {
        self.authentications
            .as_ref()
            .and_then(|a| a.pointer("/account/token/token"))
            .and_then(Value::as_str)
    }
}

/// The app install being configured.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Install {
    #[serde(default)]
    pub options: Map<String, Value>,
    #[serde(default)]
    pub schema: Schema,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Install {
    /// String value of an option. Non-string values read as absent.
    pub fn option(&self, name: &str) -> Option<&str> {
        self.options.get(name).and_then(Value::as_str)
    }

    pub fn select(&mut self, name: &str, value: String) {
        self.options.insert(name.to_string(), Value::String(value));
    }

    /// Replace the schema fragment for `name`.
    pub fn set_field(&mut self, name: &str, field: FieldSpec) {
        self.schema
            .properties
            .insert(name.to_string(), SchemaProperty::Field(field));
    }

    /// The fragment for `name`, if it has the shape of a [`FieldSpec`].
    pub fn field(&self, name: &str) -> Option<FieldSpec> {
        match self.schema.properties.get(name)? {
            SchemaProperty::Field(field) => Some(field.clone()),
            SchemaProperty::Other(value) => serde_json::from_value(value.clone()).ok(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub properties: BTreeMap<String, SchemaProperty>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A schema property: a fragment built here, or whatever Cloudflare sent.
///
/// Incoming properties always deserialize as `Other` so they serialize back
/// byte-for-byte equivalent, explicit nulls included.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SchemaProperty {
    Field(FieldSpec),
    Other(Value),
}

impl<'de> Deserialize<'de> for SchemaProperty {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Value::deserialize(deserializer).map(SchemaProperty::Other)
    }
}

/// Enumerated string field rendered as a select box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    pub order: u32,
    #[serde(rename = "enum")]
    pub choices: Vec<String>,
    /// Display name for each entry of `choices`
    #[serde(
        rename = "enumNames",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub choice_names: Option<BTreeMap<String, String>>,
    pub required: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl FieldSpec {
    /// A required string select with no display names.
    pub fn select(title: &str, order: u32, choices: Vec<String>) -> Self {
        Self {
            kind: "string".to_string(),
            title: title.to_string(),
            description: None,
            placeholder: None,
            order,
            choices,
            choice_names: None,
            required: true,
            extra: Map::new(),
        }
    }

    pub fn first_choice(&self) -> Option<&str> {
        self.choices.first().map(String::as_str)
    }
}

/// Response body for every non-error wizard step.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WizardResponse {
    pub install: Install,
    pub proceed: bool,
}

impl WizardResponse {
    /// Hand the install back and let Cloudflare continue.
    pub fn proceed(install: Install) -> Self {
        Self { install, proceed: true }
    }
}
