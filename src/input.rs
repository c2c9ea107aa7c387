use std::io::{self, BufRead};

use libc::{isatty, STDIN_FILENO};
use log::debug;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

const PROMPT: &str = "$ ";

/// Something that hands the interpreter one input line at a time.
pub trait LineSource {
    /// The next line without its terminator, `None` at end of input.
    fn read_line(&mut self) -> io::Result<Option<String>>;

    /// Makes `line` available for recall.
    fn add_history(&mut self, line: &str);
}

pub fn stdin_is_terminal() -> bool {
    (unsafe { isatty(STDIN_FILENO) }) == 1
}

/// Interactive line editing on a terminal.
pub struct Editor {
    editor: DefaultEditor,
}

impl Editor {
    pub fn new<'a, I>(recall: I) -> rustyline::Result<Editor>
    where
        I: IntoIterator<Item = &'a String>,
    {
        let mut editor = DefaultEditor::new()?;
        for line in recall {
            editor.add_history_entry(line.as_str())?;
        }

        Ok(Editor { editor })
    }
}

impl LineSource for Editor {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        match self.editor.readline(PROMPT) {
            Ok(line) => Ok(Some(line)),
            // ^C throws the current line away
            Err(ReadlineError::Interrupted) => Ok(Some(String::new())),
            Err(ReadlineError::Eof) => Ok(None),
            Err(ReadlineError::Io(e)) => Err(e),
            Err(e) => Err(io::Error::new(io::ErrorKind::Other, e.to_string())),
        }
    }

    fn add_history(&mut self, line: &str) {
        if let Err(e) = self.editor.add_history_entry(line) {
            debug!("line editor rejected history entry: {}", e);
        }
    }
}

/// Plain line reader for scripts and pipes; prints no prompt.
pub struct Piped<R> {
    reader: R,
}

impl<R: BufRead> Piped<R> {
    pub fn new(reader: R) -> Piped<R> {
        Piped { reader }
    }
}

impl<R: BufRead> LineSource for Piped<R> {
    fn read_line(&mut self) -> io::Result<Option<String>> {
        let mut line = String::new();
        if self.reader.read_line(&mut line)? == 0 {
            return Ok(None);
        }

        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }

        Ok(Some(line))
    }

    fn add_history(&mut self, _line: &str) {}
}
