use crate::fs::SFSError;

pub const SEPARATOR: char = '/';

/// Validates a volume path and returns its normalized form along with its segments.
///
/// Paths are relative to the volume root and use `/` between segments. A single leading `/`
/// is accepted and dropped so `/a/b` and `a/b` name the same file. Empty segments (including
/// a trailing `/`), `.` and `..` are rejected.
pub fn normalize(path: &str) -> Result<(String, Vec<&str>), SFSError> {
    let trimmed = path.strip_prefix(SEPARATOR).unwrap_or(path);
    if trimmed.is_empty() {
        return Err(SFSError::InvalidPath(path.to_string()));
    }

    let segments: Vec<&str> = trimmed.split(SEPARATOR).collect();
    if segments
        .iter()
        .any(|s| s.is_empty() || *s == "." || *s == "..")
    {
        return Err(SFSError::InvalidPath(path.to_string()));
    }

    Ok((segments.join("/"), segments))
}

/// Like [`normalize`] but also accepts the root itself (`""` or `"/"`), returning no segments.
pub fn normalize_dir(path: &str) -> Result<Vec<&str>, SFSError> {
    match path {
        "" | "/" => Ok(Vec::new()),
        _ => normalize(path).map(|(_, segments)| segments),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drops_leading_separator() {
        let (key, segments) = normalize("/dir1/f").unwrap();
        assert_eq!(key, "dir1/f");
        assert_eq!(segments, vec!["dir1", "f"]);
    }

    #[test]
    fn single_segment_is_a_root_level_file() {
        let (key, segments) = normalize("a").unwrap();
        assert_eq!(key, "a");
        assert_eq!(segments, vec!["a"]);
    }

    #[test]
    fn rejects_malformed_paths() {
        for bad in &["", "/", "a//b", "a/", "//a", "./a", "a/../b"] {
            match normalize(bad) {
                Err(SFSError::InvalidPath(p)) => assert_eq!(&p, bad),
                other => panic!("expected InvalidPath for {:?}, got {:?}", bad, other),
            }
        }
    }

    #[test]
    fn directory_paths_accept_root() {
        assert!(normalize_dir("").unwrap().is_empty());
        assert!(normalize_dir("/").unwrap().is_empty());
        assert_eq!(normalize_dir("a/b").unwrap(), vec!["a", "b"]);
        assert!(normalize_dir("a/").is_err());
    }
}
