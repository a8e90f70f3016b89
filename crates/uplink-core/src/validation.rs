//! Validation helpers for client-supplied upload metadata.

use crate::AppError;

const MAX_FILENAME_LENGTH: usize = 255;

/// Sanitize a client-supplied filename before it is used for storage path
/// construction. Strips any directory components, rejects traversal
/// sequences, and replaces characters outside a conservative allowlist.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    let path = std::path::Path::new(filename);
    let filename_only = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(filename);

    if filename_only.contains("..") {
        return Err(AppError::InvalidParam(
            "Filename contains invalid path traversal".to_string(),
        ));
    }

    let sanitized: String = filename_only
        .chars()
        .take(MAX_FILENAME_LENGTH)
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();

    if sanitized.trim_matches(['_', '.']).is_empty() {
        return Ok("file".to_string());
    }

    Ok(sanitized)
}

/// Lowercased extension of a filename, or empty string when it has none.
pub fn file_extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_lowercase(),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_strips_directories() {
        assert_eq!(sanitize_filename("/etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("dir/sub/report.pdf").unwrap(), "report.pdf");
    }

    #[test]
    fn test_sanitize_rejects_traversal() {
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename("a..b.txt").is_err());
    }

    #[test]
    fn test_sanitize_replaces_odd_characters() {
        assert_eq!(sanitize_filename("my file (1).txt").unwrap(), "my_file__1_.txt");
    }

    #[test]
    fn test_sanitize_empty_falls_back() {
        assert_eq!(sanitize_filename("???").unwrap(), "file");
        assert_eq!(sanitize_filename("").unwrap(), "file");
    }

    #[test]
    fn test_file_extension() {
        assert_eq!(file_extension("a.TXT"), "txt");
        assert_eq!(file_extension("archive.tar.gz"), "gz");
        assert_eq!(file_extension("noext"), "");
        assert_eq!(file_extension(".hidden"), "");
    }
}
