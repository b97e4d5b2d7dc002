//! OData `$filter` helpers

/// Quote a string literal for use inside an OData expression
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// `field eq 'value'`
pub fn eq(field: &str, value: &str) -> String {
    format!("{} eq {}", field, quote(value))
}

/// `(a and b and ...)`
pub fn and(clauses: &[String]) -> String {
    format!("({})", clauses.join(" and "))
}

/// Build `path?$filter=...` with the expression URL-encoded
pub fn with_filter(path: &str, filter: &str) -> String {
    format!("{}?$filter={}", path, urlencoding::encode(filter))
}
