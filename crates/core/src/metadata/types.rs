//! The metadata record of one sample.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use super::fields::{CoerceError, FieldKind, FixedField, FieldValue};
use super::validate::{is_valid_custom_key, is_valid_tag};
use crate::analyzer::FileInfo;

/// Synthetic flat-view key holding the space-joined tag set.
pub const TAGS_KEY: &str = "_tags";

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("invalid metadata key: {0:?}")]
    InvalidKey(String),

    #[error(transparent)]
    Coerce(#[from] CoerceError),
}

/// Fixed fields, custom key/value pairs and tags of a sample.
///
/// Every mutation validates its input. Invalid tags, keys and values are
/// dropped with a warning.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    md5: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format_subtype: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sample_rate: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channels: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    peak_level: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    custom: BTreeMap<String, String>,
    tags: BTreeSet<String>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from flat `(key, value)` pairs and a tag list.
    ///
    /// `_`-prefixed keys name fixed fields, anything else is a custom key.
    pub fn from_fields<I, K, T>(fields: I, tags: T) -> Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: AsRef<str>,
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        let mut metadata = Self::default();
        for (key, value) in fields {
            let key = key.as_ref();
            match FixedField::from_key(key) {
                Some(field) => metadata.set(field, Some(value)),
                None => metadata.set_custom(key, value.to_string()),
            }
        }
        metadata.add_tags(tags);
        metadata
    }

    /// Take the fixed fields an analyzer reported.
    pub fn from_file_info(info: &FileInfo) -> Self {
        let mut metadata = Self {
            md5: info.md5.clone(),
            format: info.format.clone(),
            format_subtype: info.format_subtype.clone(),
            sample_rate: info.sample_rate,
            channels: info.channels,
            duration: info.duration,
            peak_level: info.peak_level,
            ..Self::default()
        };
        if !info.path.is_empty() {
            metadata.path = Some(info.path.clone());
        }
        metadata
    }

    /// Convert back to the analyzer mapping. Only fields it knows survive.
    pub fn to_file_info(&self) -> FileInfo {
        FileInfo {
            path: self.path.clone().unwrap_or_default(),
            sample_rate: self.sample_rate,
            channels: self.channels,
            duration: self.duration,
            format: self.format.clone(),
            format_subtype: self.format_subtype.clone(),
            peak_level: self.peak_level,
            md5: self.md5.clone(),
            waveform: None,
        }
    }

    pub fn md5(&self) -> Option<&str> {
        self.md5.as_deref()
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn format(&self) -> Option<&str> {
        self.format.as_deref()
    }

    pub fn format_subtype(&self) -> Option<&str> {
        self.format_subtype.as_deref()
    }

    pub fn sample_rate(&self) -> Option<i64> {
        self.sample_rate
    }

    pub fn channels(&self) -> Option<i64> {
        self.channels
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn peak_level(&self) -> Option<f64> {
        self.peak_level
    }

    pub fn set_name(&mut self, name: Option<String>) {
        self.name = name;
    }

    pub fn set_path(&mut self, path: Option<String>) {
        self.path = path;
    }

    pub fn set_source(&mut self, source: Option<String>) {
        self.source = source;
    }

    /// Typed value of a fixed field.
    pub fn get(&self, field: FixedField) -> Option<FieldValue> {
        match field {
            FixedField::Md5 => self.md5.clone().map(FieldValue::Text),
            FixedField::Path => self.path.clone().map(FieldValue::Text),
            FixedField::Source => self.source.clone().map(FieldValue::Text),
            FixedField::Name => self.name.clone().map(FieldValue::Text),
            FixedField::Format => self.format.clone().map(FieldValue::Text),
            FixedField::FormatSubtype => self.format_subtype.clone().map(FieldValue::Text),
            FixedField::SampleRate => self.sample_rate.map(FieldValue::Integer),
            FixedField::Channels => self.channels.map(FieldValue::Integer),
            FixedField::Duration => self.duration.map(FieldValue::Float),
            FixedField::PeakLevel => self.peak_level.map(FieldValue::Float),
        }
    }

    /// Set or clear a fixed field, coercing to its declared type.
    ///
    /// A value that cannot be coerced clears the field and logs a warning.
    pub fn set(&mut self, field: FixedField, value: Option<FieldValue>) {
        let value = match value.map(|v| v.coerce(field)).transpose() {
            Ok(value) => value,
            Err(err) => {
                warn!(target: "metadata", "Dropping {}", err);
                None
            }
        };
        self.store(field, value);
    }

    fn store(&mut self, field: FixedField, value: Option<FieldValue>) {
        let text = || value.as_ref().map(FieldValue::to_string);
        match field {
            FixedField::Md5 => self.md5 = text(),
            FixedField::Path => self.path = text(),
            FixedField::Source => self.source = text(),
            FixedField::Name => self.name = text(),
            FixedField::Format => self.format = text(),
            FixedField::FormatSubtype => self.format_subtype = text(),
            FixedField::SampleRate => self.sample_rate = value.as_ref().and_then(FieldValue::as_i64),
            FixedField::Channels => self.channels = value.as_ref().and_then(FieldValue::as_i64),
            FixedField::Duration => self.duration = value.as_ref().and_then(FieldValue::as_f64),
            FixedField::PeakLevel => self.peak_level = value.as_ref().and_then(FieldValue::as_f64),
        }
    }

    /// Flat lookup: `_`-prefixed fixed field or custom key.
    pub fn get_key(&self, key: &str) -> Option<String> {
        match FixedField::from_key(key) {
            Some(field) => self.get(field).map(|v| v.to_string()),
            None => self.custom.get(key).cloned(),
        }
    }

    /// Flat assignment that reports what it rejects.
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<(), MetadataError> {
        if let Some(field) = FixedField::from_key(key) {
            let value = FieldValue::from(value).coerce(field)?;
            self.store(field, Some(value));
            return Ok(());
        }
        if !is_valid_custom_key(key) {
            return Err(MetadataError::InvalidKey(key.to_string()));
        }
        debug!(target: "metadata", key, value, "Setting custom value");
        self.custom.insert(key.to_string(), value.to_string());
        Ok(())
    }

    pub fn custom(&self) -> &BTreeMap<String, String> {
        &self.custom
    }

    pub fn set_custom(&mut self, key: &str, value: impl Into<String>) {
        if is_valid_custom_key(key) {
            self.custom.insert(key.to_string(), value.into());
        } else {
            warn!(target: "metadata", "Invalid meta-data key: {:?}", key);
        }
    }

    pub fn remove_custom(&mut self, key: &str) -> Option<String> {
        self.custom.remove(key)
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn set_tags<T>(&mut self, tags: T)
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        self.tags.clear();
        self.add_tags(tags);
    }

    pub fn add_tags<T>(&mut self, tags: T)
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        for tag in valid_tags(tags) {
            self.tags.insert(tag);
        }
    }

    pub fn remove_tags<T>(&mut self, tags: T)
    where
        T: IntoIterator,
        T::Item: AsRef<str>,
    {
        for tag in valid_tags(tags) {
            self.tags.remove(&tag);
        }
    }

    /// Flat string view: fixed fields under `_`-prefixed keys, then custom keys.
    pub fn fields(&self) -> BTreeMap<String, String> {
        let mut fields: BTreeMap<String, String> = FixedField::ALL
            .into_iter()
            .filter_map(|f| self.get(f).map(|v| (f.key().to_string(), v.to_string())))
            .collect();
        fields.extend(self.custom.iter().map(|(k, v)| (k.clone(), v.clone())));
        fields
    }

    /// Display label and value for `key`, with units appended.
    pub fn formatted(&self, key: &str) -> (String, String) {
        let field = FixedField::from_key(key);
        let value = match field {
            Some(field) => self.get(field).map(|value| {
                let text = match (field.kind(), &value) {
                    (FieldKind::Float, FieldValue::Float(x)) => format!("{:.2}", x),
                    _ => value.to_string(),
                };
                match field.unit() {
                    Some(unit) => format!("{} {}", text, unit),
                    None => text,
                }
            }),
            None => self.custom.get(key).cloned(),
        };
        (capitalize(key.strip_prefix('_').unwrap_or(key)), value.unwrap_or_default())
    }

    /// Values that go into the full-text document, in index order:
    /// indexable fixed fields, then custom values by key.
    pub fn indexable_values(&self) -> Vec<String> {
        let mut values: Vec<String> = FixedField::ALL
            .into_iter()
            .filter(|f| f.is_indexable())
            .filter_map(|f| self.get(f).map(|v| v.to_string()))
            .collect();
        values.extend(self.custom.values().cloned());
        values
    }
}

fn valid_tags<T>(tags: T) -> impl Iterator<Item = String>
where
    T: IntoIterator,
    T::Item: AsRef<str>,
{
    tags.into_iter().filter_map(|tag| {
        let tag = tag.as_ref();
        if is_valid_tag(tag) {
            Some(tag.to_string())
        } else {
            warn!(target: "metadata", "Invalid tag: {:?}", tag);
            None
        }
    })
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}
