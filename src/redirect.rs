// https://github.com/Geal/nom/blob/master/doc/choosing_a_combinator.md

use libc::{c_int, STDERR_FILENO, STDOUT_FILENO};
use log::{debug, warn};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::one_of,
    combinator::{map, opt, value},
    sequence::pair,
    IResult,
};

use crate::fd::{open_for_redirect, SavedStream};
use crate::parser::{tokenize, unquoted};

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn fd(self) -> c_int {
        match self {
            Stream::Stdout => STDOUT_FILENO,
            Stream::Stderr => STDERR_FILENO,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Mode {
    Truncate,
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Redirection {
    pub(crate) stream: Stream,
    pub(crate) mode: Mode,
    pub(crate) target: String,
}

/// `>`, `>>`, `1>`, `1>>`, `2>` or `2>>`
fn operator(input: &str) -> IResult<&str, (Stream, Mode)> {
    let stream = map(opt(one_of("12")), |fd| match fd {
        Some('2') => Stream::Stderr,
        _ => Stream::Stdout,
    });
    let mode = alt((
        value(Mode::Append, tag(">>")),
        value(Mode::Truncate, tag(">")),
    ));

    pair(stream, mode)(input)
}

/// Splits the first unquoted redirection off `line`.
///
/// Returns the command text in front of the operator and, if a target
/// could be read after it, the redirection itself.
pub(crate) fn extract(line: &str) -> (&str, Option<Redirection>) {
    let gt = match unquoted(line, '>').next() {
        Some(gt) => gt,
        None => return (line, None),
    };

    let start = match line[..gt].chars().next_back() {
        Some('1') | Some('2') => gt - 1,
        _ => gt,
    };
    let command = &line[..start];

    let (rest, (stream, mode)) = match operator(&line[start..]) {
        Ok(parsed) => parsed,
        Err(_) => return (command, None),
    };

    match tokenize(rest.trim()).into_iter().next() {
        Some(target) => (
            command,
            Some(Redirection {
                stream,
                mode,
                target,
            }),
        ),
        None => {
            warn!("redirection without target in {:?}", line);
            (command, None)
        }
    }
}

/// Points the shell's own stream at the redirection target. The returned
/// guard puts the original stream back when dropped.
///
/// A target that cannot be opened is skipped and output stays where it was.
pub(crate) fn apply(redirection: &Redirection) -> Option<SavedStream> {
    let file = match open_for_redirect(&redirection.target, redirection.mode == Mode::Append) {
        Ok(file) => file,
        Err(e) => {
            warn!("cannot open {}: {}", redirection.target, e);
            return None;
        }
    };

    match SavedStream::redirect(redirection.stream.fd(), &file) {
        Ok(saved) => {
            debug!("{:?} redirected to {}", redirection.stream, redirection.target);
            Some(saved)
        }
        Err(e) => {
            warn!("cannot redirect {:?}: {}", redirection.stream, e);
            None
        }
    }
}
