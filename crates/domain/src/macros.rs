//! Macro for implementing Display and FromStr for status enums
//!
//! This macro eliminates boilerplate for status enum conversions by providing
//! a single implementation for both Display and FromStr traits. Parsing is
//! case-insensitive and returns a typed [`crate::errors::StatusParseError`]
//! for unrecognized values; there is no silent fallback to a default variant.
//!
//! # Example
//!
//! ```rust
//! use loadout_domain::impl_status_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum OutboxStatus {
//!     Pending,
//!     Sent,
//!     DeadLetter,
//! }
//!
//! impl_status_conversions!(OutboxStatus {
//!     Pending => "pending",
//!     Sent => "sent",
//!     DeadLetter => "dead_letter",
//! });
//! ```

/// Implements Display and FromStr traits for status enums
///
/// This macro generates:
/// - Display trait: converts enum variants to lowercase strings
/// - FromStr trait: parses case-insensitive strings to enum variants
///
/// # Arguments
///
/// * `$enum_name` - The name of the enum type
/// * `$variant => $str` - Mapping of enum variants to their string
///   representations
///
/// # Features
///
/// - Case-insensitive parsing (e.g., "PENDING", "pending", "Pending" all work)
/// - Consistent lowercase string output
/// - Typed [`crate::errors::StatusParseError`] carrying the enum name and
///   the rejected value
#[macro_export]
macro_rules! impl_status_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(Self::$variant => write!(f, $str),)+
                }
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = $crate::errors::StatusParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_lowercase().as_str() {
                    $($str => Ok(Self::$variant),)+
                    _ => Err($crate::errors::StatusParseError::new(
                        stringify!($enum_name),
                        s,
                    )),
                }
            }
        }
    };
}
