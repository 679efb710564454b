use std::cmp::Ordering;
use std::sync::OnceLock;

/// Compare two dotted version strings component by component.
///
/// Each segment is parsed as a non-negative integer; a malformed segment
/// coerces to 0 instead of erroring, and a missing trailing segment counts
/// as 0. The result is a total order over version strings. Note that a
/// prerelease suffix embedded in the last component ("2.1.0-beta") parses
/// as 0, so it compares equal to the bare release; see
/// `is_valid_version_format` for the accepted shape.
pub fn compare(a: &str, b: &str) -> Ordering {
    let seg_a: Vec<u64> = a.split('.').map(parse_segment).collect();
    let seg_b: Vec<u64> = b.split('.').map(parse_segment).collect();

    let max_len = seg_a.len().max(seg_b.len());
    for i in 0..max_len {
        let na = seg_a.get(i).copied().unwrap_or(0);
        let nb = seg_b.get(i).copied().unwrap_or(0);
        match na.cmp(&nb) {
            Ordering::Equal => continue,
            other => return other,
        }
    }

    Ordering::Equal
}

/// Returns true when `candidate` is strictly newer than `current`.
pub fn is_newer(current: &str, candidate: &str) -> bool {
    compare(current, candidate) == Ordering::Less
}

/// Accepts `MAJOR.MINOR.PATCH` with an optional alphanumeric suffix,
/// e.g. "2.1.0" or "2.1.0-beta3".
pub fn is_valid_version_format(version: &str) -> bool {
    static FORMAT: OnceLock<regex::Regex> = OnceLock::new();
    FORMAT
        .get_or_init(|| {
            regex::Regex::new(r"^\d+\.\d+\.\d+(-[A-Za-z0-9]+)?$")
                .expect("version format regex is valid")
        })
        .is_match(version)
}

fn parse_segment(segment: &str) -> u64 {
    segment.parse::<u64>().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_not_lexicographic() {
        assert_eq!(compare("1.2.0", "1.10.0"), Ordering::Less);
        assert_eq!(compare("1.10.0", "1.9.0"), Ordering::Greater);
    }

    #[test]
    fn basic_ordering() {
        assert!(is_newer("1.0.0", "1.0.1"));
        assert!(is_newer("1.0.0", "2.0.0"));
        assert!(!is_newer("2.0.0", "1.0.0"));
        assert!(!is_newer("1.0.0", "1.0.0"));
        assert!(!is_newer("2.1.0", "2.0.9"));
    }

    #[test]
    fn missing_trailing_components_count_as_zero() {
        assert_eq!(compare("1.0", "1.0.0"), Ordering::Equal);
        assert!(is_newer("5", "5.1"));
        assert!(is_newer("1.0", "1.0.1"));
    }

    #[test]
    fn malformed_segments_coerce_to_zero() {
        assert_eq!(compare("1.x.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare("garbage", "0"), Ordering::Equal);
    }

    #[test]
    fn prerelease_suffix_is_invisible_to_ordering() {
        assert_eq!(compare("2.1.0", "2.1.0-beta"), Ordering::Equal);
    }

    #[test]
    fn antisymmetric() {
        let pairs = [("1.2.3", "1.2.4"), ("2.0.0", "2.0.0"), ("0.9.1", "0.10.0")];
        for (a, b) in pairs {
            assert_eq!(compare(a, b), compare(b, a).reverse());
        }
    }

    #[test]
    fn transitive() {
        let (a, b, c) = ("1.2.0", "1.3.5", "2.0.0");
        assert_eq!(compare(a, b), Ordering::Less);
        assert_eq!(compare(b, c), Ordering::Less);
        assert_eq!(compare(a, c), Ordering::Less);
    }

    #[test]
    fn version_format() {
        assert!(is_valid_version_format("2.1.0"));
        assert!(is_valid_version_format("0.0.1"));
        assert!(is_valid_version_format("2.1.0-beta3"));
        assert!(!is_valid_version_format("2.1"));
        assert!(!is_valid_version_format("2.1.0.4"));
        assert!(!is_valid_version_format("2.1.0-"));
        assert!(!is_valid_version_format("v2.1.0"));
    }
}
