//! Fixed metadata field declarations.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage type of a fixed field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
}

/// The schema-level attributes every sample carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FixedField {
    Md5,
    Path,
    Source,
    Name,
    Format,
    FormatSubtype,
    SampleRate,
    Channels,
    Duration,
    PeakLevel,
}

impl FixedField {
    /// All fixed fields in declaration (and column) order.
    pub const ALL: [FixedField; 10] = [
        FixedField::Md5,
        FixedField::Path,
        FixedField::Source,
        FixedField::Name,
        FixedField::Format,
        FixedField::FormatSubtype,
        FixedField::SampleRate,
        FixedField::Channels,
        FixedField::Duration,
        FixedField::PeakLevel,
    ];

    /// Column name, e.g. `sample_rate`.
    pub fn name(self) -> &'static str {
        match self {
            FixedField::Md5 => "md5",
            FixedField::Path => "path",
            FixedField::Source => "source",
            FixedField::Name => "name",
            FixedField::Format => "format",
            FixedField::FormatSubtype => "format_subtype",
            FixedField::SampleRate => "sample_rate",
            FixedField::Channels => "channels",
            FixedField::Duration => "duration",
            FixedField::PeakLevel => "peak_level",
        }
    }

    /// Key in the flat field view, e.g. `_sample_rate`.
    pub fn key(self) -> &'static str {
        match self {
            FixedField::Md5 => "_md5",
            FixedField::Path => "_path",
            FixedField::Source => "_source",
            FixedField::Name => "_name",
            FixedField::Format => "_format",
            FixedField::FormatSubtype => "_format_subtype",
            FixedField::SampleRate => "_sample_rate",
            FixedField::Channels => "_channels",
            FixedField::Duration => "_duration",
            FixedField::PeakLevel => "_peak_level",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            FixedField::SampleRate | FixedField::Channels => FieldKind::Integer,
            FixedField::Duration | FixedField::PeakLevel => FieldKind::Float,
            _ => FieldKind::Text,
        }
    }

    /// Only the display name may be changed by the user or by rewrite rules.
    pub fn is_editable(self) -> bool {
        matches!(self, FixedField::Name)
    }

    pub fn unit(self) -> Option<&'static str> {
        match self {
            FixedField::SampleRate => Some("frames/s"),
            FixedField::Duration => Some("s"),
            FixedField::PeakLevel => Some("dBFS"),
            _ => None,
        }
    }

    /// Whether values of this field go into the full-text document.
    pub fn is_indexable(self) -> bool {
        !matches!(
            self,
            FixedField::Md5
                | FixedField::Path
                | FixedField::Source
                | FixedField::Channels
                | FixedField::PeakLevel
        )
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    /// Resolve a `_`-prefixed key.
    pub fn from_key(key: &str) -> Option<Self> {
        key.strip_prefix('_').and_then(Self::from_name)
    }
}

impl fmt::Display for FixedField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed value of a fixed field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

/// Error raised when a value cannot be converted to a field's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoerceError {
    pub field: FixedField,
    pub value: String,
}

impl fmt::Display for CoerceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid {} value: {:?}", self.field, self.value)
    }
}

impl std::error::Error for CoerceError {}

impl FieldValue {
    /// Convert to the declared type of `field`.
    pub fn coerce(self, field: FixedField) -> Result<FieldValue, CoerceError> {
        let fail = |value: &FieldValue| CoerceError {
            field,
            value: value.to_string(),
        };
        match (field.kind(), self) {
            (FieldKind::Text, v) => Ok(FieldValue::Text(v.to_string())),
            (FieldKind::Integer, FieldValue::Integer(i)) => Ok(FieldValue::Integer(i)),
            (FieldKind::Integer, FieldValue::Float(x)) if x.is_finite() => {
                Ok(FieldValue::Integer(x.trunc() as i64))
            }
            (FieldKind::Integer, FieldValue::Text(ref s)) => s
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| fail(&FieldValue::Text(s.clone()))),
            (FieldKind::Float, FieldValue::Integer(i)) => Ok(FieldValue::Float(i as f64)),
            (FieldKind::Float, FieldValue::Float(x)) => Ok(FieldValue::Float(x)),
            (FieldKind::Float, FieldValue::Text(ref s)) => s
                .trim()
                .parse::<f64>()
                .map(FieldValue::Float)
                .map_err(|_| fail(&FieldValue::Text(s.clone()))),
            (_, v) => Err(fail(&v)),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(x) => Some(*x),
            FieldValue::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Integer(i) => write!(f, "{}", i),
            // Whole floats keep their fractional part: `2.0`, not `2`.
            FieldValue::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{:.1}", x)
            }
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_lookup() {
        assert_eq!(FixedField::from_key("_sample_rate"), Some(FixedField::SampleRate));
        assert_eq!(FixedField::from_key("sample_rate"), None);
        assert_eq!(FixedField::from_name("md5"), Some(FixedField::Md5));
        assert_eq!(FixedField::from_key("_bpm"), None);
    }

    #[test]
    fn test_declared_attributes() {
        assert!(FixedField::Name.is_editable());
        assert!(!FixedField::Md5.is_editable());
        assert!(!FixedField::Channels.is_indexable());
        assert!(!FixedField::PeakLevel.is_indexable());
        assert!(FixedField::Duration.is_indexable());
        assert_eq!(FixedField::PeakLevel.unit(), Some("dBFS"));
    }

    #[test]
    fn test_coerce_integer() {
        assert_eq!(
            FieldValue::from("44100").coerce(FixedField::SampleRate),
            Ok(FieldValue::Integer(44100))
        );
        assert_eq!(
            FieldValue::from(2.9).coerce(FixedField::Channels),
            Ok(FieldValue::Integer(2))
        );
        assert!(FieldValue::from("fast").coerce(FixedField::SampleRate).is_err());
    }

    #[test]
    fn test_coerce_float_and_text() {
        assert_eq!(
            FieldValue::from(3_i64).coerce(FixedField::Duration),
            Ok(FieldValue::Float(3.0))
        );
        assert_eq!(
            FieldValue::from(12_i64).coerce(FixedField::Name),
            Ok(FieldValue::Text("12".to_string()))
        );
        assert!(FieldValue::from("n/a").coerce(FixedField::PeakLevel).is_err());
    }

    #[test]
    fn test_float_display() {
        assert_eq!(FieldValue::Float(2.0).to_string(), "2.0");
        assert_eq!(FieldValue::Float(1.25).to_string(), "1.25");
        assert_eq!(FieldValue::Float(-3.5).to_string(), "-3.5");
    }
}
