//! Strict string-to-typed value coercion
//!
//! Every config value is stored as a string; typed access is a read-time
//! projection. A conversion either consumes the whole string or fails, in
//! which case the caller falls back to the type's static default and the
//! failure is reported through [`ValueInfo`].

/// Static default served when a string value is requested for a missing key.
pub const DEFAULT_VALUE_FOR_STRING: &str = "";

/// Static default for integer values.
pub const DEFAULT_VALUE_FOR_LONG: i64 = 0;

/// Static default for floating-point values.
pub const DEFAULT_VALUE_FOR_DOUBLE: f64 = 0.0;

/// Static default for boolean values.
pub const DEFAULT_VALUE_FOR_BOOL: bool = false;

/// Static default for binary values.
pub const DEFAULT_VALUE_FOR_DATA: Vec<u8> = Vec::new();

/// Which tier of the layered store supplied a value.
///
/// `Static` is distinct from `Default`: `Default` means the defaults layer
/// held the key, `Static` means no layer held it and the type's built-in
/// default was served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueSource {
    /// Key absent from both layers; the static default was returned.
    Static,
    /// Value came from the defaults layer.
    Default,
    /// Value came from the active layer (most recently activated fetch).
    Remote,
}

/// Out-parameter describing how a typed getter resolved a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueInfo {
    /// Tier that supplied the value.
    pub source: ValueSource,
    /// False when the stored string could not be coerced to the requested type.
    pub conversion_successful: bool,
}

impl ValueInfo {
    /// True when the key was present in the active or defaults layer.
    pub fn found(&self) -> bool {
        self.source != ValueSource::Static
    }
}

impl Default for ValueInfo {
    fn default() -> Self {
        Self {
            source: ValueSource::Static,
            conversion_successful: true,
        }
    }
}

/// Literal set treated as boolean true (case-sensitive, whole string).
pub fn is_bool_true(s: &str) -> bool {
    matches!(s, "1" | "true" | "t" | "yes" | "y" | "on")
}

/// Literal set treated as boolean false (case-sensitive, whole string).
pub fn is_bool_false(s: &str) -> bool {
    matches!(s, "0" | "false" | "f" | "no" | "n" | "off")
}

/// Coerce a stored string to a boolean. `None` on any other literal.
pub fn parse_bool(s: &str) -> Option<bool> {
    if is_bool_true(s) {
        Some(true)
    } else if is_bool_false(s) {
        Some(false)
    } else {
        None
    }
}

/// Coerce a stored string to a signed 64-bit integer.
///
/// Rejects the empty string and any leading whitespace, then requires the
/// parse to consume the entire string (optional sign, digits only).
pub fn parse_long(s: &str) -> Option<i64> {
    if s.is_empty() {
        return None;
    }
    if s.starts_with(char::is_whitespace) {
        return None;
    }
    s.parse().ok()
}

/// Coerce a stored string to a 64-bit float.
///
/// Same whole-string rule as [`parse_long`]: empty and leading-whitespace
/// inputs fail outright, anything left over after the number fails.
pub fn parse_double(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    if s.starts_with(char::is_whitespace) {
        return None;
    }
    s.parse().ok()
}
