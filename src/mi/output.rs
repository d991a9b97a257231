//! Machine interface output records.
//!
//! Every line the debugger prints is one of:
//! * a result record `[token]^class[,results]`, the answer to a command,
//! * an async record `[token](*|+|=)class[,results]`,
//! * a stream record `(~|@|&)"c-string"`,
//! * the `(gdb)` prompt.
use crate::debugger::Error;
use chumsky::error::Rich;
use chumsky::prelude::{any, choice, end, just, none_of, recursive};
use chumsky::{extra, text, IterParser, Parser};
use std::str::FromStr;
use strum_macros::{Display, EnumString};

type Err<'a> = extra::Err<Rich<'a, char>>;

/// Class of a result record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum ResultClass {
    Done,
    Running,
    Connected,
    Error,
    Exit,
}

/// Prefix of an async record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AsyncKind {
    /// `*`: execution state changes (running, stopped).
    Exec,
    /// `+`: progress of slow operations.
    Status,
    /// `=`: supplementary notifications (threads, breakpoints, libraries).
    Notify,
}

/// Prefix of a stream record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// `~`: CLI console output.
    Console,
    /// `@`: output of the debugged program.
    Target,
    /// `&`: debugger internal log.
    Log,
}

/// Value of a `name=value` pair.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Const(String),
    Tuple(Tuple),
    List(Vec<Value>),
    /// List written as `[name=value,...]`, names may repeat.
    ResultList(Tuple),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Const(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn as_tuple(&self) -> Option<&Tuple> {
        match self {
            Value::Tuple(t) => Some(t),
            _ => None,
        }
    }

    /// Elements of a list regardless of its flavour.
    ///
    /// Tuples are accepted as well since the debugger prints some collections
    /// (`thread-ids={thread-id="1",...}`) as tuples with repeated names.
    pub fn items(&self) -> Vec<&Value> {
        match self {
            Value::Const(_) => vec![],
            Value::List(values) => values.iter().collect(),
            Value::ResultList(t) | Value::Tuple(t) => t.iter().map(|(_, v)| v).collect(),
        }
    }
}

/// Ordered `name=value` pairs. Names are not unique.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tuple(pub Vec<(String, Value)>);

impl Tuple {
    pub fn iter(&self) -> impl Iterator<Item = &(String, Value)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Return first value with a given name.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Return all values with a given name.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Value> + 'a {
        self.0.iter().filter(move |(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    pub fn get_tuple(&self, name: &str) -> Option<&Tuple> {
        self.get(name).and_then(Value::as_tuple)
    }

    /// List elements of a named value, empty if value not exists.
    pub fn get_items(&self, name: &str) -> Vec<&Value> {
        self.get(name).map(Value::items).unwrap_or_default()
    }

    pub fn get_parsed<T: FromStr>(&self, name: &str) -> Option<T> {
        self.get_str(name).and_then(|s| s.trim().parse().ok())
    }
}

/// A single line of debugger output.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Result {
        token: Option<u64>,
        class: ResultClass,
        results: Tuple,
    },
    Async {
        token: Option<u64>,
        kind: AsyncKind,
        class: String,
        results: Tuple,
    },
    Stream {
        kind: StreamKind,
        text: String,
    },
    Prompt,
}

impl Record {
    /// Parse one output line (line terminators are ignored).
    pub fn parse(line: &str) -> Result<Record, Error> {
        let line = line.trim_end_matches(['\r', '\n']);
        record()
            .parse(line)
            .into_result()
            .map_err(|e| Error::MalformedReply(format!("{line}: {}", e[0])))
    }
}

fn c_string<'a>() -> impl Parser<'a, &'a str, String, Err<'a>> + Clone {
    let octal = text::digits(8)
        .exactly(3)
        .to_slice()
        .map(|s: &str| u8::from_str_radix(s, 8).map(char::from).unwrap_or('?'));

    let escape = just('\\').ignore_then(choice((
        octal,
        just('n').to('\n'),
        just('t').to('\t'),
        just('r').to('\r'),
        just('e').to('\x1b'),
        any(),
    )));

    none_of("\\\"")
        .or(escape)
        .repeated()
        .collect::<String>()
        .delimited_by(just('"'), just('"'))
        .labelled("c-string")
}

fn name<'a>() -> impl Parser<'a, &'a str, String, Err<'a>> + Clone {
    any()
        .filter(|c: &char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        .repeated()
        .at_least(1)
        .to_slice()
        .map(|s: &str| s.to_string())
        .labelled("name")
}

fn value<'a>() -> impl Parser<'a, &'a str, Value, Err<'a>> + Clone {
    recursive(|value| {
        let result = name().then_ignore(just('=')).then(value.clone());

        let tuple = result
            .clone()
            .separated_by(just(','))
            .collect::<Vec<_>>()
            .delimited_by(just('{'), just('}'))
            .map(|pairs| Value::Tuple(Tuple(pairs)));

        let result_list = result
            .separated_by(just(','))
            .at_least(1)
            .collect::<Vec<_>>()
            .map(|pairs| Value::ResultList(Tuple(pairs)));
        let value_list = value
            .separated_by(just(','))
            .collect::<Vec<_>>()
            .map(Value::List);
        let list = result_list
            .or(value_list)
            .delimited_by(just('['), just(']'));

        choice((c_string().map(Value::Const), tuple, list))
    })
}

fn results<'a>() -> impl Parser<'a, &'a str, Tuple, Err<'a>> + Clone {
    let result = name().then_ignore(just('=')).then(value());
    just(',')
        .ignore_then(result)
        .repeated()
        .collect::<Vec<_>>()
        .map(Tuple)
}

fn token<'a>() -> impl Parser<'a, &'a str, Option<u64>, Err<'a>> + Clone {
    text::digits(10)
        .at_least(1)
        .to_slice()
        .try_map(|s: &str, span| s.parse::<u64>().map_err(|e| Rich::custom(span, e)))
        .or_not()
}

fn record<'a>() -> impl Parser<'a, &'a str, Record, Err<'a>> {
    let prompt = just("(gdb)")
        .then(just(' ').repeated())
        .to(Record::Prompt);

    let stream = choice((
        just('~').to(StreamKind::Console),
        just('@').to(StreamKind::Target),
        just('&').to(StreamKind::Log),
    ))
    .then(c_string())
    .map(|(kind, text)| Record::Stream { kind, text });

    let class = choice((
        just("done").to(ResultClass::Done),
        just("running").to(ResultClass::Running),
        just("connected").to(ResultClass::Connected),
        just("error").to(ResultClass::Error),
        just("exit").to(ResultClass::Exit),
    ));
    let result = token()
        .then_ignore(just('^'))
        .then(class)
        .then(results())
        .map(|((token, class), results)| Record::Result {
            token,
            class,
            results,
        });

    let kind = choice((
        just('*').to(AsyncKind::Exec),
        just('+').to(AsyncKind::Status),
        just('=').to(AsyncKind::Notify),
    ));
    let r#async = token()
        .then(kind)
        .then(name())
        .then(results())
        .map(|(((token, kind), class), results)| Record::Async {
            token,
            kind,
            class,
            results,
        });

    choice((prompt, stream, result, r#async)).then_ignore(end())
}
