use serde::de::IgnoredAny;

/// Returns `true` if `buf` holds exactly one complete JSON value.
///
/// Surrounding whitespace is allowed, trailing garbage is not. Nothing is
/// allocated for the parsed value, so this can be called on every delta.
///
/// The check only looks at the current text. A transport that streams a
/// complete value and then keeps appending to it (e.g. `{}` followed by more
/// argument text) will have the prefix reported as complete; transports are
/// expected to never do that.
pub fn is_complete(buf: &str) -> bool {
    if buf.trim().is_empty() {
        return false;
    }
    serde_json::from_str::<IgnoredAny>(buf).is_ok()
}
