/// Derives the local file name (and destination object name) from a
/// submission URL: the last non-empty path segment, without query or fragment.
///
/// `.` and `..` do not name a file and yield an empty name, so the result is
/// always safe to join onto a directory.
pub fn extract_file_name(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }

    let without_fragment = url.split('#').next().unwrap_or_default();
    let without_query = without_fragment.split('?').next().unwrap_or_default();

    let segment = without_query
        .split('/')
        .rev()
        .find(|segment| !segment.is_empty())
        .unwrap_or_default();

    match segment {
        "." | ".." => String::new(),
        name => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_last_segment_of_url_path() {
        assert_eq!(
            extract_file_name("https://github.com/org/repo/releases/download/v1/report.pdf"),
            "report.pdf"
        );
    }

    #[test]
    fn empty_url_yields_empty_name() {
        assert_eq!(extract_file_name(""), "");
        assert_eq!(extract_file_name("   "), "");
    }

    #[test]
    fn ignores_trailing_slashes() {
        assert_eq!(
            extract_file_name("https://example.com/submissions/"),
            "submissions"
        );
    }

    #[test]
    fn dot_segments_do_not_name_a_file() {
        assert_eq!(extract_file_name("https://example.com/uploads/.."), "");
        assert_eq!(extract_file_name("https://example.com/uploads/../"), "");
        assert_eq!(extract_file_name("https://example.com/."), "");
        assert_eq!(extract_file_name(".."), "");
        assert_eq!(
            extract_file_name("https://example.com/..report.pdf"),
            "..report.pdf"
        );
    }

    #[test]
    fn drops_query_and_fragment() {
        assert_eq!(
            extract_file_name("https://example.com/a/archive.zip?token=abc#top"),
            "archive.zip"
        );
    }

    #[test]
    fn url_without_separator_is_its_own_name() {
        assert_eq!(extract_file_name("archive.zip"), "archive.zip");
    }
}
