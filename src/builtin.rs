use std::env;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use log::debug;
use nom::{
    character::complete::digit1,
    combinator::{all_consuming, map_res},
    IResult,
};

use crate::fd::describe_io;
use crate::parser::Command;
use crate::path::find_executable;
use crate::shell::Shell;

/// Commands that run inside the interpreter's own process.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Builtin {
    Exit,
    Echo,
    Type,
    Pwd,
    Cd,
    History,
}

impl Builtin {
    pub(crate) fn from_name(name: &str) -> Option<Builtin> {
        match name {
            "exit" => Some(Builtin::Exit),
            "echo" => Some(Builtin::Echo),
            "type" => Some(Builtin::Type),
            "pwd" => Some(Builtin::Pwd),
            "cd" => Some(Builtin::Cd),
            "history" => Some(Builtin::History),
            _ => None,
        }
    }
}

#[derive(Debug, PartialEq)]
enum HistoryAction<'a> {
    List(Option<usize>),
    Clear,
    Read(&'a str),
    Write(&'a str),
    Append(&'a str),
}

fn count(input: &str) -> Option<usize> {
    let parsed: IResult<&str, usize> =
        all_consuming(map_res(digit1, |digits: &str| digits.parse::<usize>()))(input);

    parsed.ok().map(|(_, count)| count)
}

fn history_action(parameters: &[String]) -> Result<HistoryAction<'_>, String> {
    let option = match parameters.first() {
        Some(option) => option.as_str(),
        None => return Ok(HistoryAction::List(None)),
    };

    match option {
        "-c" => Ok(HistoryAction::Clear),
        "-r" | "-w" | "-a" => {
            let file = parameters
                .get(1)
                .map(String::as_str)
                .ok_or_else(|| format!("history: {}: option requires an argument", option))?;

            Ok(match option {
                "-r" => HistoryAction::Read(file),
                "-w" => HistoryAction::Write(file),
                _ => HistoryAction::Append(file),
            })
        }
        _ => count(option)
            .map(|limit| HistoryAction::List(Some(limit)))
            .ok_or_else(|| format!("history: {}: numeric argument required", option)),
    }
}

fn history(
    shell: &mut Shell,
    parameters: &[String],
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<()> {
    let action = match history_action(parameters) {
        Ok(action) => action,
        Err(message) => return writeln!(err, "{}", message),
    };

    let (file, result) = match action {
        HistoryAction::List(limit) => return shell.history().print(limit, out),
        HistoryAction::Clear => {
            shell.history_mut().clear();
            return Ok(());
        }
        HistoryAction::Read(file) => (file, shell.history_mut().read_from(Path::new(file)).map(drop)),
        HistoryAction::Write(file) => (file, shell.history_mut().write_to(Path::new(file))),
        HistoryAction::Append(file) => {
            (file, shell.history_mut().append_to(Path::new(file)).map(drop))
        }
    };

    match result {
        Ok(()) => Ok(()),
        Err(e) => writeln!(err, "history: {}: {}", file, describe_io(&e)),
    }
}

fn cd(shell: &Shell, parameters: &[String], err: &mut dyn Write) -> io::Result<()> {
    let target = match parameters.first().map(String::as_str) {
        None | Some("~") => match &shell.config().home {
            Some(home) => home.clone(),
            None => return Ok(()),
        },
        Some(path) => PathBuf::from(path),
    };

    match env::set_current_dir(&target) {
        Ok(()) => Ok(()),
        Err(e) => writeln!(err, "cd: {}: {}", target.display(), describe_io(&e)),
    }
}

fn type_of(shell: &Shell, parameters: &[String], out: &mut dyn Write) -> io::Result<()> {
    let name = match parameters.first() {
        Some(name) => name,
        None => return Ok(()),
    };

    if Builtin::from_name(name).is_some() {
        writeln!(out, "{} is a shell builtin", name)
    } else if let Some(program) = find_executable(shell.config().search_path(), name) {
        writeln!(out, "{} is {}", name, program.display())
    } else {
        writeln!(out, "{}: not found", name)
    }
}

fn run(
    builtin: Builtin,
    shell: &mut Shell,
    parameters: &[String],
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> io::Result<()> {
    match builtin {
        Builtin::Exit => {
            shell.request_exit();
            Ok(())
        }
        Builtin::Echo => writeln!(out, "{}", parameters.join(" ")),
        Builtin::Type => type_of(shell, parameters, out),
        Builtin::Pwd => match env::current_dir() {
            Ok(dir) => writeln!(out, "{}", dir.display()),
            Err(e) => writeln!(err, "pwd: {}", describe_io(&e)),
        },
        Builtin::Cd => cd(shell, parameters, err),
        Builtin::History => history(shell, parameters, out, err),
    }
}

/// Runs `command` if it names a builtin. Returns `false`, without doing
/// anything, when it does not.
pub(crate) fn dispatch(
    shell: &mut Shell,
    command: &Command,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> bool {
    let builtin = match Builtin::from_name(&command.name) {
        Some(builtin) => builtin,
        None => return false,
    };

    if let Err(e) = run(builtin, shell, &command.parameters, out, err) {
        debug!("{} could not write its output: {}", command.name, e);
    }
    let _ = out.flush();

    true
}
