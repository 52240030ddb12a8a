//! POSIX-style path splitting on plain strings
//!
//! These operate on the text only; nothing touches the filesystem and trailing
//! slashes are not normalized away.

const SEP: char = '/';
const EXTSEP: u8 = b'.';

/// Final component of a path: everything after the last separator
pub fn basename(path: &str) -> &str {
    let start = path.rfind(SEP).map_or(0, |i| i + 1);
    &path[start..]
}

/// Everything before the final component, without trailing separators
///
/// A head made only of separators (the root) is kept intact.
pub fn dirname(path: &str) -> &str {
    let end = path.rfind(SEP).map_or(0, |i| i + 1);
    let head = &path[..end];

    if !head.is_empty() && !head.chars().all(|c| c == SEP) {
        head.trim_end_matches(SEP)
    } else {
        head
    }
}

/// Split a path into `(root, ext)` where `ext` is empty or starts with a dot
///
/// Leading dots of the final component do not start an extension, so
/// `.bashrc` has no extension.
pub fn splitext(path: &str) -> (&str, &str) {
    let bytes = path.as_bytes();
    let sep_index = path.rfind(SEP);
    let Some(dot_index) = path.rfind(EXTSEP as char) else {
        return (path, "");
    };

    if sep_index.is_none_or(|sep| dot_index > sep) {
        let filename_start = sep_index.map_or(0, |sep| sep + 1);
        if bytes[filename_start..dot_index].iter().any(|b| *b != EXTSEP) {
            return (&path[..dot_index], &path[dot_index..]);
        }
    }

    (path, "")
}
