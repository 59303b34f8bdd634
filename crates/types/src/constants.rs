//! Protocol constants.

/// The default expiry window of an initiating message, in seconds (7 days). An executing
/// message referencing an initiating message older than this is invalid.
pub const MESSAGE_EXPIRY_WINDOW: u64 = 60 * 60 * 24 * 7;

/// The version byte of the super root encoding.
pub const SUPER_ROOT_VERSION: u8 = 1;
