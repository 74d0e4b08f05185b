/// Drops every character outside `[A-Za-z0-9_]`.
pub fn strip_invalid(input: &str) -> String {
    input
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Turns a server-side name into a valid C# identifier.
///
/// Invalid characters are stripped and a leading `_` is added when the
/// result would not start with a letter or underscore. Idempotent.
///
/// Unlike the editor plugin, a leading `_` is kept: `_hidden` stays `_hidden`.
pub fn sanitize(input: &str) -> String {
    let mut ident = strip_invalid(input);
    match ident.chars().next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => ident,
        _ => {
            ident.insert(0, '_');
            ident
        }
    }
}
