use std::collections::HashSet;

/// Identifiers allowed to read chat history. Fixed for the life of the process.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnerSet {
    ids: HashSet<i64>,
}

impl OwnerSet {
    pub fn new(ids: impl IntoIterator<Item = i64>) -> Self {
        OwnerSet {
            ids: ids.into_iter().collect(),
        }
    }

    pub fn contains(&self, id: i64) -> bool {
        self.ids.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Parse a comma-separated id list. Only all-digit tokens count; the rest are skipped.
pub fn parse_owner_ids(raw: &str) -> Vec<i64> {
    let mut ids = Vec::new();
    for token in raw.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        if !token.chars().all(|c| c.is_ascii_digit()) {
            tracing::warn!("Ignoring invalid owner id '{token}'");
            continue;
        }
        match token.parse::<i64>() {
            Ok(id) if !ids.contains(&id) => ids.push(id),
            Ok(_) => {}
            Err(_) => tracing::warn!("Ignoring out-of-range owner id '{token}'"),
        }
    }
    ids
}
