//! Domain ID generation
//!
//! All IDs use the format: `{6-char-hex}-{kind}-{slug}`
//! Example: `01a3f2-chore-take-out-bins`

/// Generate a domain ID from kind and name
pub fn generate_id(kind: &str, name: &str) -> String {
    let uuid = uuid::Uuid::now_v7();
    let hex_prefix = &uuid.to_string()[..6];
    format!("{}-{}-{}", hex_prefix, kind, slugify(name))
}

/// Slugify a name for use in IDs
fn slugify(name: &str) -> String {
    name.to_lowercase()
        .chars()
        .filter_map(|c| {
            if c.is_alphanumeric() {
                Some(c)
            } else if c == '\'' || c == '\u{2019}' {
                None // strip apostrophes
            } else {
                Some('-')
            }
        })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_id_shape() {
        let id = generate_id("chore", "Take Out Bins");
        assert!(id.contains("-chore-"));
        assert!(id.ends_with("take-out-bins"));
        assert_eq!(id.split('-').next().unwrap().len(), 6);
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Feed the Dog"), "feed-the-dog");
        assert_eq!(slugify("Mow  Lawn!"), "mow-lawn");
        assert_eq!(slugify("Dad's Car"), "dads-car");
    }

    #[test]
    fn test_ids_are_unique() {
        let a = generate_id("occ", "Dishes");
        let b = generate_id("occ", "Dishes");
        assert_ne!(a, b);
    }
}
