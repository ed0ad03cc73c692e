//! Entity operations shared by the HTTP handlers and the CLI commands.
//!
//! Functions here know nothing about requests: authorization happens in the
//! caller, which passes in the acting user's id where an owner is recorded.

pub mod blog;
pub mod orders;
pub mod products;
pub mod users;

/// One `ordering` term of a list query, e.g. `-price`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// Parses a comma-separated ordering list, keeping only `allowed` fields.
pub fn parse_ordering(raw: Option<&str>, allowed: &[&str]) -> Vec<SortKey> {
    raw.unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter_map(|term| {
            let (field, descending) = match term.strip_prefix('-') {
                Some(field) => (field, true),
                None => (term, false),
            };
            allowed.contains(&field).then(|| SortKey {
                field: field.to_owned(),
                descending,
            })
        })
        .collect()
}

/// Limit/offset window of a list query. `limit == None` means no paging.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Window {
    pub limit: Option<u64>,
    pub offset: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_drops_unknown_fields() {
        let keys = parse_ordering(Some("-price, colour,name"), &["name", "price"]);
        assert_eq!(
            keys,
            vec![
                SortKey {
                    field: "price".to_owned(),
                    descending: true
                },
                SortKey {
                    field: "name".to_owned(),
                    descending: false
                },
            ]
        );
        assert!(parse_ordering(None, &["name"]).is_empty());
    }
}
