//! Case-insensitive path keys
//!
//! Snapshots may come from case-insensitive file systems, so paths are compared
//! through a normalized key: lower-cased, with `\` folded into `/`.

/// Build the comparison key for a path string
pub fn path_key(path: &str) -> String {
    path.to_lowercase().replace('\\', "/")
}

/// Check whether `key` equals `prefix` or lies beneath it.
///
/// Both arguments must already be keys produced by [`path_key`]. A prefix only
/// matches on a segment boundary, so `/v/data` does not cover `/v/database`.
pub fn is_within(key: &str, prefix: &str) -> bool {
    if prefix.is_empty() {
        return false;
    }
    match key.strip_prefix(prefix) {
        Some("") => true,
        Some(rest) => prefix.ends_with('/') || rest.starts_with('/'),
        None => false,
    }
}

fn is_separator(c: char) -> bool {
    c == '/' || c == '\\'
}

/// Directory portion of a path string, without the trailing separator
pub fn parent_of(path: &str) -> &str {
    path.rfind(is_separator).map_or("", |index| {
        if index == 0 {
            &path[..1]
        } else {
            &path[..index]
        }
    })
}

/// Final segment of a path string
pub fn file_name_of(path: &str) -> &str {
    path.rfind(is_separator)
        .map_or(path, |index| &path[index + 1..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("/V/Data/File.TXT", "/v/data/file.txt")]
    #[case(r"C:\Data\File.txt", "c:/data/file.txt")]
    fn test_path_key(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(path_key(input), expected);
    }

    #[rstest]
    #[case("/v/data", "/v/data", true)]
    #[case("/v/data/f1", "/v/data", true)]
    #[case("/v/data/f1", "/v/data/", true)]
    #[case("/v/database", "/v/data", false)]
    #[case("/v/other", "/v/data", false)]
    #[case("/v/data", "", false)]
    fn test_is_within(#[case] key: &str, #[case] prefix: &str, #[case] expected: bool) {
        assert_eq!(is_within(key, prefix), expected);
    }

    #[test]
    fn test_parent_and_name() {
        assert_eq!(parent_of("/v/data/f1"), "/v/data");
        assert_eq!(parent_of("/f1"), "/");
        assert_eq!(parent_of("f1"), "");
        assert_eq!(parent_of(r"C:\data\f1"), r"C:\data");
        assert_eq!(file_name_of("/v/data/f1"), "f1");
        assert_eq!(file_name_of("f1"), "f1");
    }
}
