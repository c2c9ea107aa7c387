use std::env;
use std::ffi::{CString, OsStr};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use libc::{access, X_OK};

fn is_executable(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }

    match CString::new(path.as_os_str().as_bytes()) {
        Ok(c_path) => (unsafe { access(c_path.as_ptr(), X_OK) }) == 0,
        Err(_) => false,
    }
}

/// Resolves a program name the way `execvp` would: a name containing `/` is
/// taken as a path, anything else is looked up in each `search_paths`
/// directory in order and the first executable match wins.
pub(crate) fn find_executable(search_paths: Option<&OsStr>, name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    if name.contains('/') {
        let path = Path::new(name);
        return if is_executable(path) {
            Some(path.to_path_buf())
        } else {
            None
        };
    }

    env::split_paths(search_paths?)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}
