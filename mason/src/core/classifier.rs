//! Deterministic classification of host failure messages.
//!
//! Hosts report failed actions as free-form reasons. Callers need a closed
//! set of kinds to decide between restocking, waiting for manual clearing,
//! refuelling or aborting.

/// What a failed placement means to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceFailureKind {
    /// The selected slot ran dry.
    MissingMaterial,
    /// The target cell is occupied, protected, or holds an entity.
    Blocked,
    /// Anything else.
    Other,
}

/// What a failed elementary motion means to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveFailureKind {
    OutOfFuel,
    Obstructed,
    /// World height or boundary limit; retrying cannot help.
    Limit,
    Other,
}

const MISSING_MARKERS: &[&str] = &["no items", "nothing to place", "empty slot", "no block"];
const BLOCKED_MARKERS: &[&str] = &[
    "cannot place",
    "obstructed",
    "occupied",
    "protected",
    "entity",
    "mob",
    "in the way",
];
const FUEL_MARKERS: &[&str] = &["out of fuel", "no fuel"];
const LIMIT_MARKERS: &[&str] = &["too high", "too low", "world limit", "out of bounds"];

pub fn classify_place_failure(message: &str) -> PlaceFailureKind {
    let lower = message.to_ascii_lowercase();
    if contains_any(&lower, MISSING_MARKERS) {
        PlaceFailureKind::MissingMaterial
    } else if contains_any(&lower, BLOCKED_MARKERS) {
        PlaceFailureKind::Blocked
    } else {
        PlaceFailureKind::Other
    }
}

pub fn classify_move_failure(message: &str) -> MoveFailureKind {
    let lower = message.to_ascii_lowercase();
    if contains_any(&lower, FUEL_MARKERS) {
        MoveFailureKind::OutOfFuel
    } else if contains_any(&lower, LIMIT_MARKERS) {
        MoveFailureKind::Limit
    } else if contains_any(&lower, BLOCKED_MARKERS) {
        MoveFailureKind::Obstructed
    } else {
        MoveFailureKind::Other
    }
}

/// True when a placement failure looks like a creature standing in the cell.
pub fn mentions_entity(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    lower.contains("entity") || lower.contains("mob")
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}
