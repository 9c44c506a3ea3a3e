/// Display fields a list can be filtered on.
pub trait Searchable {
    fn search_fields(&self) -> Vec<&str>;
}

pub fn matches(fields: &[&str], needle: &str) -> bool {
    let needle = needle.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }
    fields.iter().any(|f| f.to_lowercase().contains(&needle))
}

/// Case-insensitive substring filter over an already-fetched list. A blank
/// query keeps everything.
pub fn filter<T: Searchable>(items: Vec<T>, text: &str) -> Vec<T> {
    items
        .into_iter()
        .filter(|item| matches(&item.search_fields(), text))
        .collect()
}
