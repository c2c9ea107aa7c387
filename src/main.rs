pub mod builtin;
pub mod config;
pub mod execution;
pub mod fd;
pub mod history;
pub mod input;
pub mod parser;
pub mod path;
pub mod redirect;
pub mod shell;
pub mod sig;

use std::error::Error;
use std::io::{self, Write};

use env_logger::Env;
use log::{error, info};

use crate::config::Config;
use crate::input::{stdin_is_terminal, Editor, LineSource, Piped};
use crate::shell::Shell;
use crate::sig::ignore_interactive_signals;

fn init_logging() {
    let mut builder = env_logger::Builder::from_env(Env::new().filter_or("STSH_LOG", "off"));
    builder.format_timestamp_millis();
    let _ = builder.try_init();
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();

    let config = Config::from_env();
    info!("starting with {:?}", config);

    let mut shell = Shell::new(config);
    shell.load_history();

    let interactive = stdin_is_terminal();
    let mut source: Box<dyn LineSource> = if interactive {
        ignore_interactive_signals()?;
        Box::new(Editor::new(shell.history().entries())?)
    } else {
        Box::new(Piped::new(io::stdin().lock()))
    };

    loop {
        let line = match source.read_line() {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("reading input failed: {}", e);
                let _ = writeln!(io::stderr(), "stsh: {}", e);
                break;
            }
        };

        if shell.record(&line) {
            source.add_history(&line);
        }
        shell.execute_line(&line);

        if shell.exit_requested() {
            break;
        }
    }

    shell.save_history();

    Ok(())
}
