use std::error::Error;
use std::ffi::{CStr, CString};
use std::fmt;
use std::io::{self, Write};

use libc::{
    __errno_location, c_int, c_uint, close, dup2, fcntl, open, pipe2, strerror, EINVAL,
    F_DUPFD_CLOEXEC, O_APPEND, O_CLOEXEC, O_CREAT, O_TRUNC, O_WRONLY,
};

pub(crate) fn errno() -> c_int {
    unsafe { *__errno_location() }
}

/// Human readable text for an errno value, as `strerror` reports it.
pub(crate) fn describe(error_num: c_int) -> String {
    unsafe { CStr::from_ptr(strerror(error_num)) }
        .to_string_lossy()
        .into_owned()
}

/// Like [`describe`], but for errors coming out of `std::io`.
pub(crate) fn describe_io(error: &io::Error) -> String {
    match error.raw_os_error() {
        Some(error_num) => describe(error_num),
        None => error.to_string(),
    }
}

#[derive(Debug, PartialEq)]
pub enum FdError {
    Syscall(c_int),
}

impl fmt::Display for FdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FdError::Syscall(error_num) => write!(f, "{}", describe(*error_num)),
        }
    }
}

impl Error for FdError {}

/// An owned file descriptor. It is closed exactly once, when the guard is
/// dropped.
#[derive(Debug)]
pub(crate) struct Fd(c_int);

impl Fd {
    pub(crate) fn raw(&self) -> c_int {
        self.0
    }

    /// Closes the descriptor without running the guard.
    ///
    /// Only meant for a forked child that is about to exec or `_exit` and
    /// therefore never drops the copies it inherited.
    pub(crate) fn close_in_child(&self) {
        unsafe { close(self.0) };
    }
}

impl Drop for Fd {
    fn drop(&mut self) {
        unsafe { close(self.0) };
    }
}

/// Both ends of a unidirectional pipe.
#[derive(Debug)]
pub(crate) struct Pipe {
    pub(crate) read: Fd,
    pub(crate) write: Fd,
}

impl Pipe {
    pub(crate) fn close_in_child(&self) {
        self.read.close_in_child();
        self.write.close_in_child();
    }
}

pub(crate) fn pipe() -> Result<Pipe, FdError> {
    let mut filedes: [c_int; 2] = [-1, -1];

    match unsafe { pipe2(filedes.as_mut_ptr(), O_CLOEXEC) } {
        -1 => Err(FdError::Syscall(errno())),
        _ => Ok(Pipe {
            read: Fd(filedes[0]),
            write: Fd(filedes[1]),
        }),
    }
}

/// Opens `path` as a redirection target: created if missing, then either
/// truncated or positioned for appending.
pub(crate) fn open_for_redirect(path: &str, append: bool) -> Result<Fd, FdError> {
    let c_path = CString::new(path).map_err(|_| FdError::Syscall(EINVAL))?;
    let mode = if append { O_APPEND } else { O_TRUNC };
    let flags = O_WRONLY | O_CREAT | O_CLOEXEC | mode;

    match unsafe { open(c_path.as_ptr(), flags, 0o644 as c_uint) } {
        -1 => Err(FdError::Syscall(errno())),
        fd => Ok(Fd(fd)),
    }
}

/// A standard stream pointed at another file until the guard is dropped,
/// at which point the original descriptor is put back.
#[derive(Debug)]
pub(crate) struct SavedStream {
    target: c_int,
    saved: Fd,
}

impl SavedStream {
    pub(crate) fn redirect(target: c_int, replacement: &Fd) -> Result<SavedStream, FdError> {
        // anything still buffered belongs to the original target
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();

        // the saved copy must not leak into spawned children
        let saved = match unsafe { fcntl(target, F_DUPFD_CLOEXEC, 3) } {
            -1 => return Err(FdError::Syscall(errno())),
            fd => Fd(fd),
        };

        match unsafe { dup2(replacement.raw(), target) } {
            -1 => Err(FdError::Syscall(errno())),
            _ => Ok(SavedStream { target, saved }),
        }
    }
}

impl Drop for SavedStream {
    fn drop(&mut self) {
        let _ = io::stdout().flush();
        let _ = io::stderr().flush();

        unsafe { dup2(self.saved.raw(), self.target) };
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::io::Read;
    use std::path::PathBuf;

    use libc::{c_int, c_void};

    fn write_raw(fd: c_int, data: &[u8]) {
        let written = unsafe { libc::write(fd, data.as_ptr() as *const c_void, data.len()) };
        assert_eq!(written, data.len() as isize);
    }

    fn read_to_end(fd: c_int) -> Vec<u8> {
        let mut buffer = Vec::new();
        let mut chunk = [0u8; 64];
        loop {
            let n = unsafe { libc::read(fd, chunk.as_mut_ptr() as *mut c_void, chunk.len()) };
            assert!(n >= 0);
            if n == 0 {
                return buffer;
            }
            buffer.extend_from_slice(&chunk[..n as usize]);
        }
    }

    fn scratch_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("stsh_fd_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_pipe_reports_eof_once_write_end_dropped() {
        let super::Pipe { read, write } = super::pipe().unwrap();

        write_raw(write.raw(), b"ping");
        drop(write);

        assert_eq!(read_to_end(read.raw()), b"ping");
    }

    #[test]
    fn test_saved_stream_restores_original_target() {
        let original = super::pipe().unwrap();
        let replacement = super::pipe().unwrap();

        {
            let _guard =
                super::SavedStream::redirect(original.write.raw(), &replacement.write).unwrap();
            write_raw(original.write.raw(), b"redirected");
        }
        write_raw(original.write.raw(), b"restored");

        let super::Pipe { read, write } = original;
        drop(write);
        let super::Pipe {
            read: other_read,
            write: other_write,
        } = replacement;
        drop(other_write);

        assert_eq!(read_to_end(read.raw()), b"restored");
        assert_eq!(read_to_end(other_read.raw()), b"redirected");
    }

    #[test]
    fn test_open_for_redirect_truncates_and_appends() {
        let path = scratch_file("modes");
        fs::write(&path, "stale content\n").unwrap();
        let name = path.to_str().unwrap();

        let file = super::open_for_redirect(name, false).unwrap();
        write_raw(file.raw(), b"hi\n");
        drop(file);

        let file = super::open_for_redirect(name, true).unwrap();
        write_raw(file.raw(), b"bye\n");
        drop(file);

        let mut content = String::new();
        fs::File::open(&path)
            .unwrap()
            .read_to_string(&mut content)
            .unwrap();
        assert_eq!(content, "hi\nbye\n");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_open_for_redirect_reports_errno() {
        assert_eq!(
            super::open_for_redirect("/nonexistent-dir-for-stsh/out.txt", false).unwrap_err(),
            super::FdError::Syscall(libc::ENOENT)
        );
        assert_eq!(
            super::open_for_redirect("bad\0name", false).unwrap_err(),
            super::FdError::Syscall(libc::EINVAL)
        );
    }

    #[test]
    fn test_describe() {
        assert_eq!(super::describe(libc::ENOENT), "No such file or directory");

        let error = std::io::Error::from_raw_os_error(libc::ENOENT);
        assert_eq!(super::describe_io(&error), "No such file or directory");
    }
}
