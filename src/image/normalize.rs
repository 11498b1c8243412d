//! Line-ending normalization and the executable bit

use std::borrow::Cow;
use std::io;
use std::path::Path;
use tracing::debug;

/// Remove every `\r` that ends a line or the file.
///
/// A carriage return followed by anything other than `\n` is kept.
pub fn strip_carriage_returns(content: &[u8]) -> Cow<'_, [u8]> {
    let ends_line = |i: usize| matches!(content.get(i + 1), None | Some(b'\n'));
    if !content
        .iter()
        .enumerate()
        .any(|(i, b)| *b == b'\r' && ends_line(i))
    {
        return Cow::Borrowed(content);
    }

    let stripped = content
        .iter()
        .enumerate()
        .filter(|(i, b)| !(**b == b'\r' && ends_line(*i)))
        .map(|(_, b)| *b)
        .collect();
    Cow::Owned(stripped)
}

/// Normalize a file in place. Returns whether it was rewritten.
pub fn normalize_file(path: &Path) -> io::Result<bool> {
    let content = std::fs::read(path)?;
    match strip_carriage_returns(&content) {
        Cow::Borrowed(_) => {
            debug!(path = %path.display(), "line endings already normalized");
            Ok(false)
        }
        Cow::Owned(stripped) => {
            std::fs::write(path, stripped)?;
            debug!(path = %path.display(), "stripped carriage returns");
            Ok(true)
        }
    }
}

/// Add execute permission for owner, group and others
#[cfg(unix)]
pub fn mark_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(permissions.mode() | 0o111);
    std::fs::set_permissions(path, permissions)
}

#[cfg(not(unix))]
pub fn mark_executable(path: &Path) -> io::Result<()> {
    // No mode bits to set; still fail on a missing file
    std::fs::metadata(path).map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_cr_before_lf_and_at_eof() {
        assert_eq!(
            strip_carriage_returns(b"a\r\nb\r\nc\r").as_ref(),
            b"a\nb\nc".as_ref()
        );
    }

    #[test]
    fn test_keeps_interior_cr() {
        assert_eq!(
            strip_carriage_returns(b"progress\rdone\n").as_ref(),
            b"progress\rdone\n".as_ref()
        );
        assert!(matches!(
            strip_carriage_returns(b"plain\n"),
            Cow::Borrowed(_)
        ));
    }

    #[test]
    fn test_only_last_cr_of_a_run_is_removed() {
        // Matches `sed 's/\r$//'`: one CR per line end
        assert_eq!(
            strip_carriage_returns(b"x\r\r\n").as_ref(),
            b"x\r\n".as_ref()
        );
    }

    #[test]
    fn test_normalize_file_reports_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requirements.txt");
        std::fs::write(&path, "aiogram==3.4.1\r\nsqlalchemy==2.0.25\r\n").unwrap();

        assert!(normalize_file(&path).unwrap());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "aiogram==3.4.1\nsqlalchemy==2.0.25\n"
        );
        assert!(!normalize_file(&path).unwrap());
    }

    #[test]
    fn test_normalize_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = normalize_file(&dir.path().join("missing.txt")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[cfg(unix)]
    #[test]
    fn test_mark_executable_adds_all_x_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("entrypoint.sh");
        std::fs::write(&path, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        mark_executable(&path).unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o751);
    }
}
