//! Maps a requested hostname to the subject name its leaf certificate is issued for.

/// Collapses a hostname to the common name a leaf certificate is issued for.
///
/// One- and two-label names are kept. Three-label names become a wildcard over
/// their last two labels unless both of those labels are short, which keeps
/// names like `example.co.uk`-style suffixes intact. Four or more labels always
/// become a wildcard over everything after the first label.
pub fn resolve(domain: &str) -> String {
    let labels: Vec<&str> = domain.split('.').collect();
    match labels.len() {
        1 | 2 => domain.to_string(),
        3 => {
            let last = labels[2].len();
            let second_last = labels[1].len();
            if last >= 3 || second_last >= 4 {
                wildcard(&labels[1..])
            } else {
                domain.to_string()
            }
        }
        _ => wildcard(&labels[1..]),
    }
}

fn wildcard(labels: &[&str]) -> String {
    format!("*.{}", labels.join("."))
}

#[cfg(test)]
mod tests {
    use super::resolve;

    #[test]
    fn short_names_are_unchanged() {
        for domain in ["localhost", "example.com", "a.b", ""] {
            assert_eq!(resolve(domain), domain);
        }
    }

    #[test]
    fn three_labels_with_short_tail_are_unchanged() {
        assert_eq!(resolve("a.b.co"), "a.b.co");
        assert_eq!(resolve("www.abc.uk"), "www.abc.uk");
    }

    #[test]
    fn three_labels_with_long_tail_become_wildcards() {
        assert_eq!(resolve("sub.example.com"), "*.example.com");
        assert_eq!(resolve("x.y.info"), "*.y.info");
        // second-to-last label of four bytes triggers the wildcard on its own
        assert_eq!(resolve("www.test.io"), "*.test.io");
    }

    #[test]
    fn four_or_more_labels_always_become_wildcards() {
        assert_eq!(resolve("a.b.c.d"), "*.b.c.d");
        assert_eq!(resolve("api.eu.service.example.com"), "*.eu.service.example.com");
    }
}
