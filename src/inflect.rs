//! Singular forms of collection names, used to derive foreign keys (`posts` -> `post_id`).

/// Convert a plural collection name to its singular form.
/// e.g. "posts" -> "post", "categories" -> "category", "boxes" -> "box"
pub fn singularize(word: &str) -> String {
    let lower = word.to_lowercase();
    const INVARIANT: &[&str] = &["news", "series", "species", "data", "info", "status"];
    if INVARIANT.contains(&lower.as_str()) {
        return word.to_string();
    }
    const IRREGULAR: &[(&str, &str)] = &[
        ("people", "person"),
        ("men", "man"),
        ("women", "woman"),
        ("children", "child"),
        ("mice", "mouse"),
        ("movies", "movie"),
        ("cookies", "cookie"),
    ];
    if let Some((_, singular)) = IRREGULAR.iter().find(|(plural, _)| *plural == lower) {
        return (*singular).to_string();
    }
    if let Some(stem) = word.strip_suffix("ies") {
        if !stem.is_empty() {
            return format!("{}y", stem);
        }
    }
    for suffix in ["sses", "shes", "ches", "xes", "zes"] {
        if word.ends_with(suffix) {
            return word[..word.len() - 2].to_string();
        }
    }
    if word.ends_with("ss") || word.ends_with("us") {
        return word.to_string();
    }
    match word.strip_suffix('s') {
        Some(stem) if !stem.is_empty() => stem.to_string(),
        _ => word.to_string(),
    }
}

/// Foreign key name pointing at records of `collection`.
/// e.g. ("posts", "_id") -> "post_id", ("users", "Id") -> "userId"
pub fn foreign_key(collection: &str, suffix: &str) -> String {
    format!("{}{}", singularize(collection), suffix)
}
