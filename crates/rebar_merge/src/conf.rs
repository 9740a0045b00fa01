//! Merge constants and default presets.

/// Separator between merge-group strings (full-width Chinese comma).
pub const C_DELIMITER_MERGE_DEFAULT: &str = "、";
/// Separator between leg label and body in per-leg display text (full-width colon).
pub const C_SEP_LEG_DISPLAY: &str = "：";
/// Separator between leg prefix and body in merge-group text.
pub const C_SEP_MERGE_PREFIX: &str = ":";
/// Slot labels emitted as output columns by default.
pub const TUP_LEGS_SLOT_DEFAULT: [&str; 4] = ["A", "B", "C", "D"];

/// Logical field names used in diagnostics.
pub const C_FIELD_LENGTH: &str = "length";
/// See [`C_FIELD_LENGTH`].
pub const C_FIELD_COUNT: &str = "count";
