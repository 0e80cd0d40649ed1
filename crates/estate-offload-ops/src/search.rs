//! Free-text listing search.

use crate::record::PropertyRecord;

/// Joins the searched fields into one haystack.
const FIELD_SEPARATOR: &str = " ";

/// Case-insensitive substring search over title, description and address.
///
/// An empty or whitespace-only query returns the input unchanged, in order.
pub fn search(properties: &[PropertyRecord], query: &str) -> Vec<PropertyRecord> {
    let query = query.trim();
    if query.is_empty() {
        return properties.to_vec();
    }

    let needle = query.to_lowercase();
    properties
        .iter()
        .filter(|record| haystack(record).contains(&needle))
        .cloned()
        .collect()
}

fn haystack(record: &PropertyRecord) -> String {
    [record.title(), record.description(), record.address()]
        .join(FIELD_SEPARATOR)
        .to_lowercase()
}
