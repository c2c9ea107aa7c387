use std::env;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;

/// Settings the interpreter takes from its environment at start-up.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Colon separated program search path (`PATH`).
    pub path: Option<OsString>,
    /// Target of a bare `cd` (`HOME`).
    pub home: Option<PathBuf>,
    /// History file loaded at start-up and appended to on exit (`HISTFILE`).
    pub histfile: Option<PathBuf>,
}

fn non_empty_var(key: &str) -> Option<OsString> {
    env::var_os(key).filter(|value| !value.is_empty())
}

impl Config {
    pub fn from_env() -> Config {
        Config {
            path: env::var_os("PATH"),
            home: non_empty_var("HOME").map(PathBuf::from),
            histfile: non_empty_var("HISTFILE").map(PathBuf::from),
        }
    }

    pub fn search_path(&self) -> Option<&OsStr> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::OsStr;

    #[test]
    fn test_from_env_reads_path() {
        let config = super::Config::from_env();
        assert_eq!(config.path, std::env::var_os("PATH"));
    }

    #[test]
    fn test_search_path() {
        let config = super::Config {
            path: Some("/bin:/usr/bin".into()),
            ..Default::default()
        };
        assert_eq!(config.search_path(), Some(OsStr::new("/bin:/usr/bin")));
        assert_eq!(super::Config::default().search_path(), None);
    }
}
