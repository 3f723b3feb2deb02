//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Scan-level validation errors.
///
/// All variants are recoverable and surfaced synchronously to the caller of
/// the mutating operation; no partial mutation occurs when one is returned.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "detail")]
pub enum ScanError {
    #[error("order is not finalized")]
    OrderNotFinalized,

    #[error("order has no line items")]
    EmptyOrder,

    #[error("sku {0} is not part of this scan list")]
    ItemNotInChecklist(String),

    #[error("unit {0} not found in registry")]
    UnitNotFound(String),

    #[error("sku mismatch: expected {expected}, found {found}")]
    SkuMismatch { expected: String, found: String },

    #[error("unit {0} already scanned for this line")]
    AlreadyScanned(String),

    #[error("unit {0} has not been scanned for this line")]
    AssetNotScanned(String),

    #[error("required quantity already reached for sku {0}")]
    QuantityExceeded(String),
}

/// Main error type for Loadout
#[derive(Error, Debug, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum LoadoutError {
    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error("database error: {0}")]
    Database(String),

    #[error("remote store error: {0}")]
    Remote(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StatusParseError> for LoadoutError {
    fn from(err: StatusParseError) -> Self {
        Self::InvalidInput(err.to_string())
    }
}

/// Result type alias for Loadout operations
pub type Result<T> = std::result::Result<T, LoadoutError>;

/// Error returned when a persisted status string does not map to a known
/// enum variant. Unknown values are rejected, never defaulted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid {type_name}: {value}")]
pub struct StatusParseError {
    type_name: &'static str,
    value: String,
}

impl StatusParseError {
    /// Create a parse error for the given enum name and rejected input.
    #[must_use]
    pub fn new(type_name: &'static str, value: &str) -> Self {
        Self { type_name, value: value.to_string() }
    }

    /// Name of the enum that rejected the value.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// The rejected input value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_error_display_includes_detail() {
        let err = ScanError::SkuMismatch { expected: "SPK-12".into(), found: "LED-01".into() };
        assert_eq!(err.to_string(), "sku mismatch: expected SPK-12, found LED-01");
    }

    #[test]
    fn scan_error_converts_into_loadout_error() {
        let err: LoadoutError = ScanError::EmptyOrder.into();
        assert!(matches!(err, LoadoutError::Scan(ScanError::EmptyOrder)));
    }

    #[test]
    fn scan_error_serializes_tagged() {
        let err = ScanError::AlreadyScanned("SN-1".into());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["type"], "AlreadyScanned");
    }
}
