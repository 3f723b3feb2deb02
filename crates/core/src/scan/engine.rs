//! Scan application engine.
//!
//! Pure, synchronous mutations over a [`ScanList`]. Every function validates
//! before it mutates, so a returned error guarantees the list is unchanged.
//! Unit resolution and SKU verification against the asset registry happen in
//! [`crate::ScanService`]; by the time these functions run, `sku` names the
//! line the caller intends to progress.

use chrono::{DateTime, Utc};
use loadout_domain::constants::{is_synthetic_unit_id, SYNTHETIC_UNIT_PREFIX};
use loadout_domain::{ScanError, ScanList, ScanListStatus};
use uuid::Uuid;

/// Manual count change for bulk stock, one unit at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Increment,
    Decrement,
}

/// Record a scan of `unit_id` against the line for `sku`.
///
/// Fails with `ItemNotInChecklist`, `AlreadyScanned` or `QuantityExceeded`;
/// on success the unit joins the line's membership, `last_scanned_at` is
/// stamped and all derived counters and statuses are recomputed.
pub fn record_scan(
    list: &mut ScanList,
    unit_id: &str,
    sku: &str,
    now: DateTime<Utc>,
) -> Result<(), ScanError> {
    let line =
        list.line_mut(sku).ok_or_else(|| ScanError::ItemNotInChecklist(sku.to_string()))?;

    if line.contains_unit(unit_id) {
        return Err(ScanError::AlreadyScanned(unit_id.to_string()));
    }
    if line.at_capacity() {
        return Err(ScanError::QuantityExceeded(sku.to_string()));
    }

    line.scanned_units.push(unit_id.to_string());
    line.last_scanned_at = Some(now);
    list.recompute(now);
    Ok(())
}

/// Remove a previously recorded scan.
///
/// A completed list with remaining progress settles at `InProgress`, never
/// back to `Pending`; only a list drained to zero reverts to `Pending` and
/// clears `completed_at`.
pub fn remove_scan(
    list: &mut ScanList,
    unit_id: &str,
    sku: &str,
    now: DateTime<Utc>,
) -> Result<(), ScanError> {
    let line =
        list.line_mut(sku).ok_or_else(|| ScanError::ItemNotInChecklist(sku.to_string()))?;

    let position = line
        .scanned_units
        .iter()
        .position(|u| u == unit_id)
        .ok_or_else(|| ScanError::AssetNotScanned(unit_id.to_string()))?;

    line.scanned_units.remove(position);
    list.recompute(now);
    Ok(())
}

/// Apply a manual count adjustment to the line for `sku`.
///
/// Increments mint a synthetic unit identifier and obey the same quantity
/// cap as physical scans. Decrements remove the most recently added member,
/// preferring synthetic identifiers over real ones so corrections undo
/// manual additions first; decrementing an empty line is a no-op.
///
/// Returns `true` when the membership changed.
pub fn adjust_count(
    list: &mut ScanList,
    sku: &str,
    adjustment: Adjustment,
    now: DateTime<Utc>,
) -> Result<bool, ScanError> {
    let line =
        list.line_mut(sku).ok_or_else(|| ScanError::ItemNotInChecklist(sku.to_string()))?;

    match adjustment {
        Adjustment::Increment => {
            if line.at_capacity() {
                return Err(ScanError::QuantityExceeded(sku.to_string()));
            }
            line.scanned_units.push(format!("{SYNTHETIC_UNIT_PREFIX}{}", Uuid::new_v4()));
            line.last_scanned_at = Some(now);
        }
        Adjustment::Decrement => {
            if line.scanned_units.is_empty() {
                return Ok(false);
            }
            let index = line
                .scanned_units
                .iter()
                .rposition(|u| is_synthetic_unit_id(u))
                .unwrap_or(line.scanned_units.len() - 1);
            line.scanned_units.remove(index);
        }
    }

    list.recompute(now);
    Ok(true)
}

/// Defensive recomputation after a partial or corrupted synchronization pull.
///
/// A list whose line collection is empty while `required_total` claims
/// outstanding work cannot display a truthful completion percentage, so it
/// degrades to an empty pending list rather than lying. Otherwise totals and
/// status are re-derived from the lines, which also zeroes aggregate
/// counters a pull patched on without per-line backing.
pub fn refresh(list: &mut ScanList, now: DateTime<Utc>) {
    if list.lines.is_empty() && list.required_total > 0 {
        list.required_total = 0;
        list.scanned_total = 0;
        list.status = ScanListStatus::Pending;
        list.completed_at = None;
        list.updated_at = now;
        return;
    }
    list.recompute(now);
}
