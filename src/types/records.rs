//! Raw input rows produced by the data-access collaborator.
//!
//! Operator-entered numbers are unreliable: any numeric field may arrive as a
//! number, a numeric string, an empty string, or not at all. [`FlexNumber`]
//! accepts all of these and resolves to 0 when the value is unusable.

use chrono::NaiveDate;
use serde::de::{self, Deserializer, Visitor};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

// ============================================================================
// FlexNumber
// ============================================================================

/// A numeric field that tolerates missing or malformed input.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlexNumber(Option<f64>);

impl FlexNumber {
    pub const fn new(value: f64) -> Self {
        Self(Some(value))
    }

    pub const fn missing() -> Self {
        Self(None)
    }

    /// Parse operator text. Blank or unparseable text is treated as missing.
    pub fn parse(text: &str) -> Self {
        Self(text.trim().parse::<f64>().ok())
    }

    /// The value as delivered, if it was a number at all.
    pub const fn raw(self) -> Option<f64> {
        self.0
    }

    /// Safe-parse: missing, NaN and infinite values become 0.
    pub fn value(self) -> f64 {
        safe_number(self.0)
    }
}

impl From<f64> for FlexNumber {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

/// Coerce an optional number to a finite value, substituting 0.
pub fn safe_number(value: Option<f64>) -> f64 {
    match value {
        Some(v) if v.is_finite() => v,
        _ => 0.0,
    }
}

impl Serialize for FlexNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.0 {
            Some(v) if v.is_finite() => serializer.serialize_f64(v),
            _ => serializer.serialize_none(),
        }
    }
}

impl<'de> Deserialize<'de> for FlexNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(FlexNumberVisitor)
    }
}

struct FlexNumberVisitor;

impl<'de> Visitor<'de> for FlexNumberVisitor {
    type Value = FlexNumber;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a number, a numeric string, or null")
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<FlexNumber, E> {
        Ok(FlexNumber::new(v))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_i64<E: de::Error>(self, v: i64) -> Result<FlexNumber, E> {
        Ok(FlexNumber::new(v as f64))
    }

    #[allow(clippy::cast_precision_loss)]
    fn visit_u64<E: de::Error>(self, v: u64) -> Result<FlexNumber, E> {
        Ok(FlexNumber::new(v as f64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<FlexNumber, E> {
        Ok(FlexNumber::parse(v))
    }

    fn visit_bool<E: de::Error>(self, _v: bool) -> Result<FlexNumber, E> {
        Ok(FlexNumber::missing())
    }

    fn visit_none<E: de::Error>(self) -> Result<FlexNumber, E> {
        Ok(FlexNumber::missing())
    }

    fn visit_unit<E: de::Error>(self) -> Result<FlexNumber, E> {
        Ok(FlexNumber::missing())
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<FlexNumber, D::Error> {
        deserializer.deserialize_any(FlexNumberVisitor)
    }
}

// ============================================================================
// Raw Rows
// ============================================================================

/// One production row per (calendar date, machine[, material]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDayRecord {
    pub date: NaiveDate,
    #[serde(alias = "line")]
    pub machine: String,
    #[serde(default)]
    pub material: Option<String>,
    #[serde(default)]
    pub pounds: FlexNumber,
    #[serde(default, alias = "machineRunHours", alias = "machine_hours")]
    pub machine_run_hours: FlexNumber,
    #[serde(default, alias = "maintenanceDowntimeHours", alias = "maintenance_hours")]
    pub maintenance_downtime_hours: FlexNumber,
}

impl RawDayRecord {
    pub fn new(
        date: NaiveDate,
        machine: impl Into<String>,
        material: Option<&str>,
        pounds: f64,
        machine_run_hours: f64,
        maintenance_downtime_hours: f64,
    ) -> Self {
        Self {
            date,
            machine: machine.into(),
            material: material.map(str::to_string),
            pounds: pounds.into(),
            machine_run_hours: machine_run_hours.into(),
            maintenance_downtime_hours: maintenance_downtime_hours.into(),
        }
    }
}

/// Free-text downtime reason entered by an operator for a machine-day.
///
/// Many rows may exist per machine-day; they are never deduplicated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DowntimeReasonRecord {
    pub date: NaiveDate,
    #[serde(alias = "line")]
    pub machine: String,
    #[serde(alias = "reasonText", alias = "reason")]
    pub reason_text: String,
}

impl DowntimeReasonRecord {
    pub fn new(date: NaiveDate, machine: impl Into<String>, reason_text: impl Into<String>) -> Self {
        Self {
            date,
            machine: machine.into(),
            reason_text: reason_text.into(),
        }
    }
}
