use super::DomainError;

/// Keywords rejected as whole words, case-insensitive. A filter value has no
/// business containing these; rejecting beats escaping for misuse this blunt.
const FORBIDDEN: &[&str] = &[
    "or", "and", "drop", "delete", "insert", "update", "union",
];

/// Escape a string so it can be interpolated into an equality filter.
///
/// Quotes are doubled; a `;` anywhere or a forbidden keyword as a whole word
/// rejects the input with [`DomainError::FilterInjection`].
pub fn sanitize(input: &str) -> Result<String, DomainError> {
    if input.contains(';') {
        return Err(DomainError::filter_injection(format!(
            "filter value contains ';': {input}"
        )));
    }

    let lower = input.to_lowercase();
    for word in lower.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
        if FORBIDDEN.contains(&word) {
            return Err(DomainError::filter_injection(format!(
                "filter value contains forbidden keyword '{word}': {input}"
            )));
        }
    }

    Ok(input.replace('\'', "''").replace('"', "\"\""))
}

/// Like [`sanitize`], additionally escaping the LIKE wildcards `%` and `_`
/// with a backslash so the value matches literally.
pub fn sanitize_like(input: &str) -> Result<String, DomainError> {
    let safe = sanitize(input)?;
    Ok(safe
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_"))
}
