use std::str::CharIndices;

#[derive(Debug, Clone, Copy, PartialEq)]
enum Quote {
    None,
    Single,
    Double,
}

/// A lexical piece of one command segment.
///
/// Adjacent `Text` and `Quoted` pieces belong to the same argument; only a
/// `Separator` ends an argument.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    Text(String),
    Quoted(String),
    Separator,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Command {
    pub(crate) name: String,
    pub(crate) parameters: Vec<String>,
}

impl Command {
    pub(crate) fn from_words(words: Vec<String>) -> Option<Command> {
        let mut words = words.into_iter();
        let name = words.next()?;

        Some(Command {
            name,
            parameters: words.collect(),
        })
    }

    pub(crate) fn argv(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.name.as_str()).chain(self.parameters.iter().map(String::as_str))
    }
}

/// Yields the byte offsets of every `needle` that is neither quoted nor
/// escaped.
pub(crate) struct Unquoted<'a> {
    chars: CharIndices<'a>,
    quote: Quote,
    needle: char,
}

pub(crate) fn unquoted(line: &str, needle: char) -> Unquoted<'_> {
    Unquoted {
        chars: line.char_indices(),
        quote: Quote::None,
        needle,
    }
}

impl Iterator for Unquoted<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        while let Some((i, chr)) = self.chars.next() {
            match (self.quote, chr) {
                (Quote::Single, '\'') | (Quote::Double, '"') => self.quote = Quote::None,
                (Quote::None, '\'') => self.quote = Quote::Single,
                (Quote::None, '"') => self.quote = Quote::Double,
                (quote, '\\') if quote != Quote::Single => {
                    self.chars.next();
                }
                (Quote::None, chr) if chr == self.needle => return Some(i),
                _ => {}
            }
        }

        None
    }
}

fn trim_horizontal(segment: &str) -> &str {
    segment.trim_matches(|chr| chr == ' ' || chr == '\t')
}

/// Splits a line at every unquoted, unescaped `|`.
///
/// Always returns at least one (possibly empty) segment.
pub(crate) fn split_pipeline(line: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;

    for i in unquoted(line, '|') {
        segments.push(trim_horizontal(&line[start..i]));
        start = i + 1;
    }
    segments.push(trim_horizontal(&line[start..]));

    segments
}

fn flush_text(tokens: &mut Vec<Token>, buffer: &mut String) {
    if !buffer.is_empty() {
        tokens.push(Token::Text(std::mem::take(buffer)));
    }
}

pub(crate) fn lex(segment: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut buffer = String::new();
    let mut quote = Quote::None;
    let mut chars = segment.chars().peekable();

    while let Some(chr) = chars.next() {
        match (quote, chr) {
            (Quote::Single, '\'') | (Quote::Double, '"') => {
                tokens.push(Token::Quoted(std::mem::take(&mut buffer)));
                quote = Quote::None;
            }
            (Quote::Single, chr) => buffer.push(chr),
            (Quote::Double, '\\') => match chars.peek() {
                Some(&next) if matches!(next, '"' | '\\' | '$' | '\n') => {
                    buffer.push(next);
                    chars.next();
                }
                _ => buffer.push('\\'),
            },
            (Quote::Double, chr) => buffer.push(chr),
            (Quote::None, '\\') => buffer.push(chars.next().unwrap_or('\\')),
            (Quote::None, '\'') => {
                flush_text(&mut tokens, &mut buffer);
                quote = Quote::Single;
            }
            (Quote::None, '"') => {
                flush_text(&mut tokens, &mut buffer);
                quote = Quote::Double;
            }
            (Quote::None, ' ') => {
                flush_text(&mut tokens, &mut buffer);
                match tokens.last() {
                    None | Some(Token::Separator) => {}
                    Some(_) => tokens.push(Token::Separator),
                }
            }
            (Quote::None, chr) => buffer.push(chr),
        }
    }

    // an unterminated quote simply ends with the input
    if quote == Quote::None {
        flush_text(&mut tokens, &mut buffer);
    } else {
        tokens.push(Token::Quoted(buffer));
    }

    tokens
}

/// Resolves quoting and escaping of one command segment into its arguments.
pub(crate) fn tokenize(segment: &str) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();

    for token in lex(segment) {
        match token {
            Token::Text(text) | Token::Quoted(text) => word.push_str(&text),
            Token::Separator => {
                if !word.is_empty() {
                    words.push(std::mem::take(&mut word));
                }
            }
        }
    }
    if !word.is_empty() {
        words.push(word);
    }

    words
}

/// Turns a line without redirection into its pipeline stages. Blank
/// segments are dropped.
pub(crate) fn parse_pipeline(line: &str) -> Vec<Command> {
    split_pipeline(line)
        .into_iter()
        .filter_map(|segment| Command::from_words(tokenize(segment)))
        .collect()
}
