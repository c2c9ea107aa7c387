use std::error::Error;
use std::ffi::{CString, OsStr};
use std::fmt;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::PathBuf;
use std::ptr::null;

use libc::{
    _exit, c_char, c_int, dup2, execv, fork, pid_t, waitpid, EINTR, STDIN_FILENO, STDOUT_FILENO,
    WEXITSTATUS, WIFEXITED, WIFSIGNALED, WTERMSIG,
};
use log::{debug, warn};

use crate::builtin::{self, Builtin};
use crate::fd::{describe, errno, pipe, Fd, FdError, Pipe};
use crate::parser::Command;
use crate::redirect::{self, Redirection};
use crate::shell::Shell;
use crate::sig::restore_default_signals;

#[derive(Debug, PartialEq)]
pub enum ExecutionError {
    Syscall(c_int),
    NulByte(String),
}

impl fmt::Display for ExecutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionError::Syscall(error_num) => write!(f, "{}", describe(*error_num)),
            ExecutionError::NulByte(argument) => {
                write!(f, "{}: argument contains a NUL byte", argument)
            }
        }
    }
}

impl Error for ExecutionError {}

impl From<FdError> for ExecutionError {
    fn from(error: FdError) -> ExecutionError {
        match error {
            FdError::Syscall(error_num) => ExecutionError::Syscall(error_num),
        }
    }
}

/// How a single pipeline stage gets run.
#[derive(Debug, PartialEq)]
pub(crate) enum Stage<'a> {
    Builtin(&'a Command),
    External { command: &'a Command, program: PathBuf },
    NotFound(&'a Command),
}

impl Stage<'_> {
    fn command(&self) -> &Command {
        match self {
            Stage::Builtin(command) | Stage::NotFound(command) => *command,
            Stage::External { command, .. } => *command,
        }
    }
}

pub(crate) fn resolve<'a>(command: &'a Command, search_path: Option<&OsStr>) -> Stage<'a> {
    if Builtin::from_name(&command.name).is_some() {
        return Stage::Builtin(command);
    }

    match crate::path::find_executable(search_path, &command.name) {
        Some(program) => Stage::External { command, program },
        None => Stage::NotFound(command),
    }
}

/// Program path and argument vector, converted before forking so the child
/// does not allocate between `fork` and `execv`.
struct ExecImage {
    program: CString,
    // owns the strings `pointers` refers to
    argv: Vec<CString>,
    pointers: Vec<*const c_char>,
}

impl ExecImage {
    fn prepare(stage: &Stage) -> Result<Option<ExecImage>, ExecutionError> {
        let (command, program) = match stage {
            Stage::External { command, program } => (command, program),
            _ => return Ok(None),
        };

        let to_c = |bytes: &[u8]| {
            CString::new(bytes)
                .map_err(|_| ExecutionError::NulByte(String::from_utf8_lossy(bytes).into_owned()))
        };

        let program = to_c(program.as_os_str().as_bytes())?;
        let argv = command
            .argv()
            .map(|argument| to_c(argument.as_bytes()))
            .collect::<Result<Vec<_>, _>>()?;
        let mut pointers: Vec<*const c_char> = argv.iter().map(|arg| arg.as_ptr()).collect();
        pointers.push(null());

        Ok(Some(ExecImage {
            program,
            argv,
            pointers,
        }))
    }

    /// Only returns if `execv` failed.
    fn exec(&self) -> c_int {
        unsafe { execv(self.program.as_ptr(), self.pointers.as_ptr()) };
        errno()
    }
}

/// The pipe ends a stage uses in place of its standard input and output.
/// `None` keeps the stream the shell itself has.
#[derive(Default)]
struct Wiring<'p> {
    stdin: Option<&'p Fd>,
    stdout: Option<&'p Fd>,
}

fn wire_child(wiring: &Wiring, pipes: &[Pipe]) -> Result<(), ExecutionError> {
    if let Some(fd) = wiring.stdin {
        if unsafe { dup2(fd.raw(), STDIN_FILENO) } == -1 {
            return Err(ExecutionError::Syscall(errno()));
        }
    }
    if let Some(fd) = wiring.stdout {
        if unsafe { dup2(fd.raw(), STDOUT_FILENO) } == -1 {
            return Err(ExecutionError::Syscall(errno()));
        }
    }

    // every end that stays open keeps some reader from seeing end-of-file
    for pipe in pipes {
        pipe.close_in_child();
    }

    Ok(())
}

fn run_child(shell: &mut Shell, stage: &Stage, image: Option<&ExecImage>) -> c_int {
    match (stage, image) {
        (Stage::Builtin(command), _) => {
            builtin::dispatch(shell, command, &mut io::stdout(), &mut io::stderr());
            0
        }
        (Stage::External { command, .. }, Some(image)) => {
            let error_num = image.exec();
            let _ = writeln!(io::stderr(), "{}: {}", command.name, describe(error_num));
            1
        }
        // not-found stages are reported by the parent and never forked
        _ => 1,
    }
}

/// Forks one stage with the given wiring. Every stage, piped or not, is
/// started through here.
///
/// In the child all `pipes` are closed after wiring, then the stage runs
/// and the child terminates: with 0 after a builtin, with 1 if the program
/// could not be executed.
fn spawn(
    shell: &mut Shell,
    stage: &Stage,
    wiring: Wiring,
    pipes: &[Pipe],
) -> Result<pid_t, ExecutionError> {
    let image = ExecImage::prepare(stage)?;

    let _ = io::stdout().flush();
    let _ = io::stderr().flush();

    match unsafe { fork() } {
        -1 => Err(ExecutionError::Syscall(errno())),
        0 => {
            restore_default_signals();
            let status = match wire_child(&wiring, pipes) {
                Ok(()) => run_child(shell, stage, image.as_ref()),
                Err(_) => 1,
            };
            let _ = io::stdout().flush();
            unsafe { _exit(status) }
        }
        pid => {
            debug!("started {} as {}", stage.command().name, pid);
            Ok(pid)
        }
    }
}

/// Blocks until `pid` terminates and returns its exit code, `128 + signal`
/// when it was killed.
fn wait_child(pid: pid_t) -> Option<c_int> {
    let mut status: c_int = 0;

    loop {
        match unsafe { waitpid(pid, &mut status, 0) } {
            -1 if errno() == EINTR => continue,
            -1 => {
                warn!("waitpid {} failed: {}", pid, describe(errno()));
                return None;
            }
            _ => break,
        }
    }

    if WIFEXITED(status) {
        Some(WEXITSTATUS(status))
    } else if WIFSIGNALED(status) {
        Some(128 + WTERMSIG(status))
    } else {
        None
    }
}

fn run_single(shell: &mut Shell, stage: &Stage) -> Result<(), ExecutionError> {
    match stage {
        Stage::Builtin(command) => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            builtin::dispatch(shell, command, &mut out, &mut io::stderr());
        }
        Stage::NotFound(command) => {
            let _ = writeln!(io::stdout(), "{}: command not found", command.name);
        }
        Stage::External { .. } => {
            let pid = spawn(shell, stage, Wiring::default(), &[])?;
            let status = wait_child(pid);
            debug!("{} exited with {:?}", stage.command().name, status);
        }
    }

    Ok(())
}

fn run_multi(shell: &mut Shell, stages: &[Stage]) -> Result<(), ExecutionError> {
    let mut pipes = Vec::with_capacity(stages.len() - 1);
    for _ in 1..stages.len() {
        pipes.push(pipe()?);
    }

    let last = stages.len() - 1;
    let mut children = Vec::with_capacity(stages.len());
    for (i, stage) in stages.iter().enumerate() {
        let wiring = Wiring {
            stdin: if i > 0 { Some(&pipes[i - 1].read) } else { None },
            stdout: if i < last { Some(&pipes[i].write) } else { None },
        };

        // reported on the shell's own stdout; its pipe end closes with the
        // others below, so the next stage just sees end-of-file
        if let Stage::NotFound(command) = stage {
            let _ = writeln!(io::stdout(), "{}: command not found", command.name);
            continue;
        }

        match spawn(shell, stage, wiring, &pipes) {
            Ok(pid) => children.push(pid),
            Err(e) => {
                warn!("stage {} ({}) abandoned: {}", i, stage.command().name, e);
                let _ = writeln!(io::stderr(), "stsh: {}: {}", stage.command().name, e);
            }
        }
    }

    // the parent must not hold any pipe end while it waits
    drop(pipes);

    let statuses: Vec<_> = children.iter().map(|&pid| wait_child(pid)).collect();
    debug!("pipeline exited with {:?}", statuses);

    Ok(())
}

/// Runs all stages and waits for every process it started.
///
/// The redirection is applied to the shell's own stream for the whole run,
/// so children inherit it and only the last stage, whose output is not
/// piped, writes through it. The original stream is back once this returns.
pub(crate) fn run_pipeline(
    shell: &mut Shell,
    commands: &[Command],
    redirection: Option<&Redirection>,
) -> Result<(), ExecutionError> {
    let stages: Vec<Stage> = commands
        .iter()
        .map(|command| resolve(command, shell.config().search_path()))
        .collect();
    if stages.is_empty() {
        return Ok(());
    }

    let _restore = redirection.and_then(redirect::apply);

    if let [stage] = stages.as_slice() {
        run_single(shell, stage)
    } else {
        run_multi(shell, &stages)
    }
}
