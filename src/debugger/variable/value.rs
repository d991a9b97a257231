use crate::debugger::frame::parse_address;
use crate::debugger::variable::r#type::TypeKind;
use std::fmt::{Display, Formatter};
use strum_macros::{Display, EnumString};

/// Display format of a bound variable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum Format {
    #[default]
    Natural,
    Binary,
    Decimal,
    Hexadecimal,
    Octal,
    ZeroHexadecimal,
}

/// Value text decoded according to the variable type.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Bool(bool),
    Char(char),
    Int(i128),
    Float(f64),
    Enum(String),
    Pointer(u64),
    Function(Option<u64>),
    /// Structs and arrays, shown as printed.
    Aggregate(String),
    Unavailable(String),
}

impl Display for ScalarValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalarValue::Bool(b) => write!(f, "{b}"),
            ScalarValue::Char(c) => write!(f, "{c:?}"),
            ScalarValue::Int(i) => write!(f, "{i}"),
            ScalarValue::Float(v) => write!(f, "{v}"),
            ScalarValue::Enum(s) | ScalarValue::Aggregate(s) | ScalarValue::Unavailable(s) => {
                f.write_str(s)
            }
            ScalarValue::Pointer(addr) => write!(f, "{addr:#x}"),
            ScalarValue::Function(Some(addr)) => write!(f, "{addr:#x}"),
            ScalarValue::Function(None) => f.write_str("<function>"),
        }
    }
}

fn parse_int(text: &str) -> Option<i128> {
    let text = text.split_whitespace().next()?;
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = match digits.strip_prefix("0x") {
        Some(hex) => i128::from_str_radix(hex, 16).ok()?,
        None if digits.len() > 1 && digits.starts_with('0') => {
            i128::from_str_radix(&digits[1..], 8).ok()?
        }
        None => digits.parse().ok()?,
    };
    Some(if negative { -value } else { value })
}

/// Character between quotes of `97 'a'` or `L'a'`, numeric code otherwise.
fn parse_char(text: &str) -> Option<char> {
    if let (Some(open), Some(close)) = (text.find('\''), text.rfind('\'')) {
        if close > open + 1 {
            let inner = &text[open + 1..close];
            let mut chars = inner.chars();
            if let (Some(c), None) = (chars.next(), chars.next()) {
                return Some(c);
            }
        }
    }
    parse_int(text).and_then(|code| char::from_u32(code as u32))
}

/// Decode printed value of a given type class.
pub fn decode(kind: TypeKind, text: &str) -> ScalarValue {
    let unavailable = || ScalarValue::Unavailable(text.to_string());
    let text = text.trim();

    match kind {
        TypeKind::Bool => match text {
            "true" => ScalarValue::Bool(true),
            "false" => ScalarValue::Bool(false),
            _ => parse_int(text).map_or_else(unavailable, |i| ScalarValue::Bool(i != 0)),
        },
        TypeKind::Char | TypeKind::WChar => parse_char(text).map_or_else(unavailable, ScalarValue::Char),
        TypeKind::Short | TypeKind::Int | TypeKind::Long | TypeKind::LongLong => {
            parse_int(text).map_or_else(unavailable, ScalarValue::Int)
        }
        TypeKind::Enum => match parse_int(text) {
            Some(i) => ScalarValue::Int(i),
            None => ScalarValue::Enum(text.to_string()),
        },
        TypeKind::Float | TypeKind::Double => text
            .parse::<f64>()
            .map_or_else(|_| unavailable(), ScalarValue::Float),
        TypeKind::Pointer => parse_address(text).map_or_else(unavailable, ScalarValue::Pointer),
        // references print as `@0x7ffe1234: value`
        TypeKind::Reference => text
            .strip_prefix('@')
            .and_then(|rest| parse_address(rest.split(':').next().unwrap_or_default()))
            .map_or_else(unavailable, ScalarValue::Pointer),
        // functions print as `{int (int)} 0x401126 <calc>`
        TypeKind::Function => {
            let addr = text
                .rsplit_once('}')
                .map(|(_, rest)| rest)
                .unwrap_or(text);
            ScalarValue::Function(parse_address(addr))
        }
        TypeKind::Struct | TypeKind::Array => ScalarValue::Aggregate(text.to_string()),
        TypeKind::Void | TypeKind::Incomplete => unavailable(),
    }
}
