//! Client-supplied filename handling.

const FALLBACK_NAME: &str = "demo";
const MAX_NAME_BYTES: usize = 100;

/// Reduce an uploaded filename to a single safe path component.
///
/// Only the last segment (split on both `/` and `\`) survives, characters
/// that are unsafe on common filesystems become `_`, and leading dots are
/// dropped so the result can never be `.` or `..`.
pub fn sanitize_upload_name(name: Option<&str>) -> String {
    let last = name
        .unwrap_or_default()
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default();

    let sanitized: String = last
        .chars()
        .map(|c| match c {
            ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = sanitized
        .trim()
        .trim_start_matches('.')
        .trim_matches('_')
        .trim();

    if trimmed.is_empty() {
        return FALLBACK_NAME.to_string();
    }

    let mut end = trimmed.len().min(MAX_NAME_BYTES);
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    trimmed[..end].to_string()
}

/// Suggested download name for the analysis archive of `sanitized`.
pub fn download_name(sanitized: &str) -> String {
    format!("{}_analysis.zip", sanitized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_name_kept() {
        assert_eq!(sanitize_upload_name(Some("faze-vs-navi.dem")), "faze-vs-navi.dem");
        assert_eq!(download_name("faze-vs-navi.dem"), "faze-vs-navi.dem_analysis.zip");
    }

    #[test]
    fn test_traversal_stripped() {
        assert_eq!(sanitize_upload_name(Some("../../evil")), "evil");
        assert_eq!(sanitize_upload_name(Some("/etc/passwd")), "passwd");
        assert_eq!(sanitize_upload_name(Some("..\\..\\windows\\match.dem")), "match.dem");
        assert_eq!(sanitize_upload_name(Some("C:\\demos\\match.dem")), "match.dem");
    }

    #[test]
    fn test_dot_names_fall_back() {
        assert_eq!(sanitize_upload_name(Some("..")), "demo");
        assert_eq!(sanitize_upload_name(Some(".")), "demo");
        assert_eq!(sanitize_upload_name(Some("../")), "demo");
        assert_eq!(sanitize_upload_name(Some("...dem")), "dem");
        assert_eq!(sanitize_upload_name(Some("")), "demo");
        assert_eq!(sanitize_upload_name(None), "demo");
    }

    #[test]
    fn test_unsafe_chars_replaced() {
        assert_eq!(sanitize_upload_name(Some("a:b*c?.dem")), "a_b_c_.dem");
        assert_eq!(sanitize_upload_name(Some("x\0y\n.dem")), "x_y_.dem");
        assert_eq!(sanitize_upload_name(Some("\"quoted\".dem")), "quoted_.dem");
    }

    #[test]
    fn test_length_capped_on_char_boundary() {
        let long = "é".repeat(80);
        let sanitized = sanitize_upload_name(Some(&long));
        assert!(sanitized.len() <= MAX_NAME_BYTES);
        assert!(sanitized.chars().all(|c| c == 'é'));
    }
}
