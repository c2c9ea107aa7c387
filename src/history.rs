use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::debug;

/// Ordered log of entered lines.
///
/// `written` counts the leading entries already persisted; `history -a`
/// and the save on exit only write what follows it.
#[derive(Debug, Default)]
pub(crate) struct History {
    entries: Vec<String>,
    written: usize,
}

impl History {
    pub(crate) fn new() -> History {
        History::default()
    }

    pub(crate) fn push(&mut self, line: &str) {
        self.entries.push(line.to_string());
    }

    pub(crate) fn entries(&self) -> &[String] {
        &self.entries
    }

    pub(crate) fn clear(&mut self) {
        self.entries.clear();
        self.written = 0;
    }

    /// Appends every non-blank line of `path` and moves the cursor past the
    /// number of lines read.
    pub(crate) fn read_from(&mut self, path: &Path) -> io::Result<usize> {
        let reader = BufReader::new(File::open(path)?);
        let mut loaded = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                loaded.push(line);
            }
        }

        let count = loaded.len();
        self.entries.extend(loaded);
        self.written = (self.written + count).min(self.entries.len());
        debug!("read {} history entries from {}", count, path.display());

        Ok(count)
    }

    /// Replaces the content of `path` with the whole history.
    pub(crate) fn write_to(&mut self, path: &Path) -> io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        for entry in &self.entries {
            writeln!(writer, "{}", entry)?;
        }
        writer.flush()?;

        self.written = self.entries.len();

        Ok(())
    }

    /// Appends the entries not yet persisted to `path`.
    pub(crate) fn append_to(&mut self, path: &Path) -> io::Result<usize> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        let pending = &self.entries[self.written..];
        for entry in pending {
            writeln!(writer, "{}", entry)?;
        }
        writer.flush()?;

        let count = pending.len();
        self.written = self.entries.len();
        debug!("appended {} history entries to {}", count, path.display());

        Ok(count)
    }

    /// Prints the last `limit` entries (all of them without a limit), each
    /// after its 1-based position.
    pub(crate) fn print(&self, limit: Option<usize>, out: &mut dyn Write) -> io::Result<()> {
        let skip = match limit {
            Some(limit) => self.entries.len().saturating_sub(limit),
            None => 0,
        };

        for (i, entry) in self.entries.iter().enumerate().skip(skip) {
            writeln!(out, "{:>5}  {}", i + 1, entry)?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use super::History;

    fn scratch_file(name: &str) -> PathBuf {
        let path =
            std::env::temp_dir().join(format!("stsh_history_{}_{}", std::process::id(), name));
        let _ = fs::remove_file(&path);
        path
    }

    fn history_of(lines: &[&str]) -> History {
        let mut history = History::new();
        for line in lines {
            history.push(line);
        }
        history
    }

    fn printed(history: &History, limit: Option<usize>) -> String {
        let mut out = Vec::new();
        history.print(limit, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_print_all() {
        let history = history_of(&["echo hello", "pwd", "history"]);
        assert_eq!(
            printed(&history, None),
            "    1  echo hello\n    2  pwd\n    3  history\n"
        );
    }

    #[test]
    fn test_print_last_entries() {
        let history = history_of(&["a", "b", "c"]);
        assert_eq!(printed(&history, Some(2)), "    2  b\n    3  c\n");
        assert_eq!(printed(&history, Some(10)), "    1  a\n    2  b\n    3  c\n");
        assert_eq!(printed(&history, Some(0)), "");
    }

    #[test]
    fn test_write_clear_read_round_trip() {
        let path = scratch_file("round_trip");
        let mut history = history_of(&["echo one", "echo 'two  spaces'", "ls | wc -l"]);
        let original = history.entries().to_vec();

        history.write_to(&path).unwrap();
        history.clear();
        assert!(history.entries().is_empty());
        assert_eq!(history.written, 0);

        assert_eq!(history.read_from(&path).unwrap(), 3);
        assert_eq!(history.entries(), original.as_slice());
        assert_eq!(history.written, 3);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_write_overwrites_file() {
        let path = scratch_file("overwrite");
        fs::write(&path, "old\nstuff\n").unwrap();

        let mut history = history_of(&["new"]);
        history.write_to(&path).unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "new\n");
        assert_eq!(history.written, 1);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_append_is_incremental() {
        let path = scratch_file("append");
        let mut history = history_of(&["first", "second"]);

        assert_eq!(history.append_to(&path).unwrap(), 2);
        assert_eq!(history.append_to(&path).unwrap(), 0);
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\n");

        history.push("third");
        assert_eq!(history.append_to(&path).unwrap(), 1);
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\nsecond\nthird\n");

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_read_skips_blank_lines_and_keeps_existing_entries() {
        let path = scratch_file("blank");
        fs::write(&path, "ls\n\n   \necho hi\n").unwrap();

        let mut history = history_of(&["pwd"]);
        assert_eq!(history.read_from(&path).unwrap(), 2);
        assert_eq!(history.entries(), &["pwd", "ls", "echo hi"]);
        assert_eq!(history.written, 2);

        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_read_missing_file() {
        let mut history = history_of(&["pwd"]);
        let error = history
            .read_from(&scratch_file("does_not_exist"))
            .unwrap_err();

        assert_eq!(error.kind(), std::io::ErrorKind::NotFound);
        assert_eq!(history.entries(), &["pwd"]);
        assert_eq!(history.written, 0);
    }
}
