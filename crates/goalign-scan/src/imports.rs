//! Import-clause parser for Go source files.
//!
//! Only the package clause and the import declarations that follow it are
//! read. Each declaration is parsed on its own, starting where the previous
//! one ended, and parsing stops at the first declaration that does not begin
//! with `import`, so the rest of the file is never looked at.

use std::ops::Range;

use chumsky::error::SimpleReason;
use chumsky::prelude::*;
use thiserror::Error;

/// One import spec from an import declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportSpec {
    /// Local name (`foo`, `.` or `_`), if any.
    pub name: Option<String>,
    /// Unquoted import path.
    pub path: String,
    /// 1-based line of the path literal.
    pub line: usize,
}

/// Error produced when the import clause is malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}: {message}")]
pub struct ImportParseError {
    /// 1-based line where the error was detected.
    pub line: usize,
    /// Description of the problem.
    pub message: String,
}

/// Import spec with the char offset of its path literal.
#[derive(Debug, Clone)]
struct RawImport {
    name: Option<String>,
    path: String,
    offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trivia {
    Inline,
    MultiLine,
    Unterminated,
}

/// Char offsets of line starts.
struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    fn new(chars: &[char]) -> Self {
        let mut starts = vec![0];
        starts.extend(
            chars
                .iter()
                .enumerate()
                .filter(|(_, c)| **c == '\n')
                .map(|(idx, _)| idx + 1),
        );
        Self { starts }
    }

    fn line(&self, offset: usize) -> usize {
        self.starts.partition_point(|start| *start <= offset)
    }
}

fn to_parse_error(err: Simple<char>, base: usize, lines: &LineIndex) -> ImportParseError {
    let message = match err.reason() {
        SimpleReason::Custom(message) => message.clone(),
        _ => err.to_string(),
    };
    ImportParseError {
        line: lines.line(base + err.span().start),
        message,
    }
}

/// Run `parser` over the input starting at char offset `base`.
fn run<O>(
    parser: impl Parser<char, O, Error = Simple<char>>,
    chars: &[char],
    base: usize,
    lines: &LineIndex,
) -> Result<O, ImportParseError> {
    parser
        .parse(&chars[base..])
        .map_err(|errs| match errs.into_iter().next() {
            Some(err) => to_parse_error(err, base, lines),
            None => ImportParseError {
                line: lines.line(base),
                message: "malformed import clause".to_string(),
            },
        })
}

/// Parse the package clause and import declarations of a Go source file.
pub fn parse_imports(src: &str) -> Result<Vec<ImportSpec>, ImportParseError> {
    let src = src.strip_prefix('\u{feff}').unwrap_or(src);
    let chars: Vec<char> = src.chars().collect();
    let lines = LineIndex::new(&chars);

    let mut pos = run(package_clause(), &chars, 0, &lines)?;
    let mut imports = Vec::new();
    while let Some(keyword_end) = run(import_keyword(), &chars, pos, &lines)? {
        let start = pos + keyword_end;
        let (specs, end) = run(import_decl(), &chars, start, &lines)?;
        imports.extend(specs.into_iter().map(|raw| ImportSpec {
            name: raw.name,
            path: raw.path,
            line: lines.line(start + raw.offset),
        }));
        pos = start + end;
    }
    Ok(imports)
}

/// `package <name>` and its terminator; yields the offset after it.
fn package_clause() -> impl Parser<char, usize, Error = Simple<char>> {
    gap()
        .ignore_then(keyword("package"))
        .ignore_then(gap())
        .ignore_then(ident())
        .ignore_then(terminator())
        .map_with_span(|_, span: Range<usize>| span.end)
}

/// Offset after the next `import` keyword, or `None` when the next
/// declaration is something else.
fn import_keyword() -> impl Parser<char, Option<usize>, Error = Simple<char>> {
    gap()
        .ignore_then(keyword("import").or_not())
        .map_with_span(|found, span: Range<usize>| found.map(|_| span.end))
}

/// Single spec or parenthesized group following `import`.
fn import_decl() -> impl Parser<char, (Vec<RawImport>, usize), Error = Simple<char>> {
    let spec_in_group = import_spec()
        .then_ignore(choice((just(')').rewind().ignored(), terminator())))
        .then_ignore(gap());

    let group = just('(')
        .ignore_then(gap())
        .ignore_then(spec_in_group.repeated())
        .then_ignore(just(')'))
        .then_ignore(terminator());

    gap()
        .ignore_then(choice((
            group,
            import_spec().then_ignore(terminator()).map(|spec| vec![spec]),
        )))
        .map_with_span(|specs, span: Range<usize>| (specs, span.end))
}

fn import_spec() -> impl Parser<char, RawImport, Error = Simple<char>> + Clone {
    let name = choice((ident(), just('.').to(".".to_string())))
        .then_ignore(inline_space())
        .or_not();

    let path = string_literal()
        .try_map(|path, span: Range<usize>| {
            if is_valid_import(&path) {
                Ok(path)
            } else {
                Err(Simple::custom(span, format!("invalid import path: {path:?}")))
            }
        })
        .map_with_span(|path, span: Range<usize>| (path, span.start));

    name.then(path).map(|(name, (path, offset))| RawImport { name, path, offset })
}

/// Same rules as `go/parser`: non-empty, graphic, no spaces or punctuation
/// that cannot appear in a package path.
fn is_valid_import(path: &str) -> bool {
    const ILLEGAL: &str = "!\"#$%&'()*,:;<=>?[\\]^{|}`\u{fffd}";
    !path.is_empty()
        && path
            .chars()
            .all(|c| !c.is_control() && !c.is_whitespace() && !ILLEGAL.contains(c))
}

fn keyword(word: &'static str) -> impl Parser<char, (), Error = Simple<char>> + Clone {
    ident().try_map(move |raw, span| {
        if raw == word {
            Ok(())
        } else {
            Err(Simple::custom(span, format!("expected `{word}`, found `{raw}`")))
        }
    })
}

fn ident() -> impl Parser<char, String, Error = Simple<char>> + Clone {
    filter(|c: &char| *c == '_' || c.is_alphabetic())
        .chain(filter(|c: &char| *c == '_' || c.is_alphanumeric()).repeated())
        .collect::<String>()
}

fn string_literal() -> impl Parser<char, String, Error = Simple<char>> + Clone {
    let interpreted = just('"')
        .ignore_then(
            choice((
                filter(|c: &char| !matches!(c, '"' | '\\' | '\n')),
                just('\\').ignore_then(escape()),
            ))
            .repeated()
            .collect::<String>(),
        )
        .then_ignore(just('"'));

    // Carriage returns are discarded from raw strings.
    let raw = just('`')
        .ignore_then(filter(|c: &char| *c != '`').repeated())
        .then_ignore(just('`'))
        .map(|chars| chars.into_iter().filter(|c| *c != '\r').collect::<String>());

    choice((interpreted, raw))
}

fn escape() -> impl Parser<char, char, Error = Simple<char>> + Clone {
    let simple = one_of("abfnrtv\\\"").map(|c| match c {
        'a' => '\u{7}',
        'b' => '\u{8}',
        'f' => '\u{c}',
        'n' => '\n',
        'r' => '\r',
        't' => '\t',
        'v' => '\u{b}',
        other => other,
    });

    choice((
        simple,
        just('x').ignore_then(code_point(2, 16)),
        just('u').ignore_then(code_point(4, 16)),
        just('U').ignore_then(code_point(8, 16)),
        code_point(3, 8),
    ))
}

fn code_point(digits: usize, radix: u32) -> impl Parser<char, char, Error = Simple<char>> + Clone {
    filter(move |c: &char| c.is_digit(radix))
        .repeated()
        .exactly(digits)
        .collect::<String>()
        .try_map(move |text, span| {
            u32::from_str_radix(&text, radix)
                .ok()
                .and_then(char::from_u32)
                .ok_or_else(|| Simple::custom(span, "escape is an invalid Unicode code point"))
        })
}

fn line_comment() -> impl Parser<char, (), Error = Simple<char>> + Clone {
    just("//")
        .ignore_then(filter(|c: &char| *c != '\n').repeated())
        .ignored()
}

fn block_comment() -> impl Parser<char, Trivia, Error = Simple<char>> + Clone {
    just("/*").ignore_then(choice((
        take_until(just("*/")).map(|(body, _)| {
            if body.contains(&'\n') {
                Trivia::MultiLine
            } else {
                Trivia::Inline
            }
        }),
        any().repeated().to(Trivia::Unterminated),
    )))
}

fn unterminated(span: Range<usize>) -> Simple<char> {
    Simple::custom(span, "comment not terminated")
}

/// Whitespace, newlines and comments.
fn gap() -> impl Parser<char, (), Error = Simple<char>> + Clone {
    choice((
        one_of(" \t\r\n").to(Trivia::Inline),
        line_comment().to(Trivia::Inline),
        block_comment(),
    ))
    .repeated()
    .try_map(|trivia: Vec<Trivia>, span| {
        if trivia.contains(&Trivia::Unterminated) {
            Err(unterminated(span))
        } else {
            Ok(())
        }
    })
}

/// Whitespace and comments that do not end the line.
fn inline_space() -> impl Parser<char, (), Error = Simple<char>> + Clone {
    choice((
        one_of(" \t\r").ignored(),
        block_comment().try_map(|comment, span| match comment {
            Trivia::Inline => Ok(()),
            _ => Err(Simple::custom(span, "comment ends the line")),
        }),
    ))
    .repeated()
    .ignored()
}

/// Explicit `;` or a newline acting as one.
fn terminator() -> impl Parser<char, (), Error = Simple<char>> + Clone {
    inline_space().ignore_then(choice((
        just(';').ignored(),
        just('\n').ignored(),
        line_comment().then_ignore(just('\n').ignored().or(end())),
        block_comment().try_map(|comment, span| match comment {
            Trivia::MultiLine => Ok(()),
            Trivia::Unterminated => Err(unterminated(span)),
            Trivia::Inline => Err(Simple::custom(span, "expected `;` or newline")),
        }),
        end(),
    )))
}
