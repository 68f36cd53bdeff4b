//! Typed ID definitions for the domain entities.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for Identity entities (account holders).
pub struct Identity;

/// Marker type for OneTimeCode entities.
pub struct OneTimeCode;

/// Marker type for Device entities.
pub struct Device;

/// Marker type for LedgerEntry entities.
pub struct LedgerEntry;

// ============================================================================
// Type aliases
// ============================================================================

pub type IdentityId = Id<Identity>;

pub type OneTimeCodeId = Id<OneTimeCode>;

pub type DeviceId = Id<Device>;

pub type LedgerEntryId = Id<LedgerEntry>;
