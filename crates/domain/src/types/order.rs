//! Order references and line items supplied by the external quote source.

use serde::{Deserialize, Serialize};

/// Minimal view of an order as the scan core needs it.
///
/// Pricing, customer data and quote editing live in the order subsystem;
/// the scan core only cares about identity, a display label and whether
/// the order has been finalized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRef {
    pub id: String,
    pub label: String,
    pub finalized: bool,
}

impl OrderRef {
    /// Convenience constructor for a finalized order.
    #[must_use]
    pub fn finalized(id: &str, label: &str) -> Self {
        Self { id: id.to_string(), label: label.to_string(), finalized: true }
    }
}

/// One line of a finalized order: what to pack and how many.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLineItem {
    pub sku: String,
    pub name: String,
    pub category: Option<String>,
    pub quantity: u32,
}

impl OrderLineItem {
    /// Build a line item.
    #[must_use]
    pub fn new(sku: &str, name: &str, category: Option<&str>, quantity: u32) -> Self {
        Self {
            sku: sku.to_string(),
            name: name.to_string(),
            category: category.map(ToString::to_string),
            quantity,
        }
    }
}
