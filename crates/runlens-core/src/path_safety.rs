use std::ffi::OsString;
use std::io;
use std::path::Path;
use std::path::PathBuf;

/// Candidate prefixes that are refused before any filesystem access.
pub const UNSAFE_PREFIXES: [&str; 8] = [
    "/etc", "/var", "/usr", "/bin", "/sbin", "/root", "/home", "..",
];

/// Cheap textual pre-filter. A plain string prefix check, not a normalized
/// path comparison; `resolves_within` is the actual boundary.
pub fn has_unsafe_prefix(candidate: &str) -> bool {
    UNSAFE_PREFIXES
        .iter()
        .any(|prefix| candidate.starts_with(prefix))
}

/// Resolves `base/candidate` with symlinks expanded and accepts it only when
/// the result stays under the canonical `base`.
///
/// Components that do not exist yet are appended lexically to the deepest
/// existing ancestor, so a missing path can still be judged safe and reported
/// as missing by the caller. Any other resolution failure is unsafe.
pub fn resolves_within(base: &Path, candidate: &str) -> bool {
    let Ok(base) = base.canonicalize() else {
        return false;
    };
    match resolve_lenient(&base.join(candidate)) {
        Ok(resolved) => resolved.starts_with(&base),
        Err(_) => false,
    }
}

/// Both stages of the path check.
pub fn is_safe(base: &Path, candidate: &str) -> bool {
    !has_unsafe_prefix(candidate) && resolves_within(base, candidate)
}

fn resolve_lenient(path: &Path) -> io::Result<PathBuf> {
    let mut existing = path.to_path_buf();
    let mut missing: Vec<OsString> = Vec::new();
    loop {
        match existing.canonicalize() {
            Ok(mut resolved) => {
                for component in missing.iter().rev() {
                    resolved.push(component);
                }
                return Ok(resolved);
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                // `file_name` is None for a trailing `..`, which cannot be
                // resolved without the directory existing.
                let Some(name) = existing.file_name() else {
                    return Err(err);
                };
                missing.push(name.to_os_string());
                if !existing.pop() {
                    return Err(err);
                }
            }
            Err(err) => return Err(err),
        }
    }
}
