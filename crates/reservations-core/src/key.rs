/// Name of the reservation document inside the store.
pub const DOCUMENT_NAME: &str = "reservations.json";

/// Resolve the storage key of the reservation document.
///
/// An optional deployment namespace is joined in front of the document name
/// with trailing slashes trimmed. A namespace that is empty once trimmed is
/// treated as absent.
pub fn document_key(prefix: Option<&str>) -> String {
    match prefix.map(|p| p.trim_end_matches('/')) {
        Some(p) if !p.is_empty() => format!("{}/{}", p, DOCUMENT_NAME),
        _ => DOCUMENT_NAME.to_string(),
    }
}
