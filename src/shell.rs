use std::io::{self, Write};

use log::{debug, info, warn};

use crate::config::Config;
use crate::execution::run_pipeline;
use crate::fd::describe_io;
use crate::history::History;
use crate::parser::parse_pipeline;
use crate::redirect;

/// Process-wide interpreter state: configuration, the history store and
/// whether `exit` was requested.
#[derive(Debug)]
pub struct Shell {
    config: Config,
    history: History,
    exit_requested: bool,
}

impl Shell {
    pub fn new(config: Config) -> Shell {
        Shell {
            config,
            history: History::new(),
            exit_requested: false,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub(crate) fn history(&self) -> &History {
        &self.history
    }

    pub(crate) fn history_mut(&mut self) -> &mut History {
        &mut self.history
    }

    pub(crate) fn request_exit(&mut self) {
        self.exit_requested = true;
    }

    pub fn exit_requested(&self) -> bool {
        self.exit_requested
    }

    /// Loads `HISTFILE`, if configured. A missing file is not an error.
    pub fn load_history(&mut self) {
        let path = match &self.config.histfile {
            Some(path) => path,
            None => return,
        };

        match self.history.read_from(path) {
            Ok(count) => info!("loaded {} entries from {}", count, path.display()),
            Err(e) => debug!("no history loaded from {}: {}", path.display(), e),
        }
    }

    /// Appends the entries entered since start-up to `HISTFILE`.
    pub fn save_history(&mut self) {
        let path = match &self.config.histfile {
            Some(path) => path,
            None => return,
        };

        if let Err(e) = self.history.append_to(path) {
            warn!("cannot save history to {}: {}", path.display(), e);
            let _ = writeln!(
                io::stderr(),
                "history: {}: {}",
                path.display(),
                describe_io(&e)
            );
        }
    }

    /// Adds a non-blank input line to the history. Returns whether it was
    /// recorded.
    pub fn record(&mut self, line: &str) -> bool {
        if line.trim().is_empty() {
            return false;
        }

        self.history.push(line);
        true
    }

    /// Runs one input line: redirection first, then the pipeline it leaves.
    pub fn execute_line(&mut self, line: &str) {
        let (command_line, redirection) = redirect::extract(line);
        let pipeline = parse_pipeline(command_line);
        if pipeline.is_empty() {
            return;
        }

        debug!("pipeline {:?}, redirection {:?}", pipeline, redirection);

        if let Err(e) = run_pipeline(self, &pipeline, redirection.as_ref()) {
            let _ = writeln!(io::stderr(), "stsh: {}", e);
        }
    }
}
