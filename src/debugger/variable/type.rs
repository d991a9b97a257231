use std::fmt::{Display, Formatter};

/// Closed set of type classes the binder distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeKind {
    Bool,
    Char,
    WChar,
    Short,
    Int,
    Long,
    LongLong,
    Enum,
    Float,
    Double,
    Function,
    Struct,
    Array,
    Pointer,
    Reference,
    Void,
    /// Placeholder for a type that could not be resolved.
    Incomplete,
}

/// Resolved type of a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub name: String,
    pub kind: TypeKind,
    /// Pointee, referenced or element type.
    pub target: Option<Box<Type>>,
    /// Number of array elements.
    pub len: Option<usize>,
}

impl Display for Type {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

impl Type {
    fn new(name: &str, kind: TypeKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            target: None,
            len: None,
        }
    }

    fn derived(name: &str, kind: TypeKind, target: Type) -> Self {
        Self {
            target: Some(Box::new(target)),
            ..Self::new(name, kind)
        }
    }

    pub fn incomplete(name: &str) -> Self {
        Self::new(name.trim(), TypeKind::Incomplete)
    }

    pub fn target_kind(&self) -> Option<TypeKind> {
        self.target.as_ref().map(|t| t.kind)
    }

    /// Structs and unresolved types have named fields.
    pub fn has_fields(&self) -> bool {
        matches!(self.kind, TypeKind::Struct | TypeKind::Incomplete)
    }

    /// Resolve a type from its name without asking the debugger.
    ///
    /// Returns `None` for names that are not built-in or explicitly tagged
    /// (`struct`, `class`, `union`, `enum`), such as typedefs.
    pub fn parse(name: &str) -> Option<Type> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        if let Some(rest) = name.strip_suffix('&') {
            let target = Type::parse(rest.trim_end_matches('&'))?;
            return Some(Type::derived(name, TypeKind::Reference, target));
        }
        if name.contains("(*)") {
            let function = Type::new(&name.replacen("(*)", "", 1), TypeKind::Function);
            return Some(Type::derived(name, TypeKind::Pointer, function));
        }
        if name.ends_with(')') {
            return Some(Type::new(name, TypeKind::Function));
        }
        if let Some(rest) = name.strip_suffix('*') {
            let rest = rest.trim_end();
            let rest = rest.strip_suffix("const").unwrap_or(rest);
            let target = Type::parse(rest)?;
            return Some(Type::derived(name, TypeKind::Pointer, target));
        }
        if name.ends_with(']') {
            let open = name.rfind('[')?;
            let len = name[open + 1..name.len() - 1].trim().parse().ok();
            let element = Type::parse(&name[..open])?;
            let mut array = Type::derived(name, TypeKind::Array, element);
            array.len = len;
            return Some(array);
        }

        let words: Vec<&str> = name
            .split_whitespace()
            .filter(|w| !matches!(*w, "const" | "volatile" | "signed" | "unsigned"))
            .collect();
        let kind = match words.as_slice() {
            [] | ["int"] => TypeKind::Int,
            ["bool"] | ["_Bool"] => TypeKind::Bool,
            ["char"] => TypeKind::Char,
            ["wchar_t"] | ["char16_t"] | ["char32_t"] => TypeKind::WChar,
            ["short"] | ["short", "int"] => TypeKind::Short,
            ["long"] | ["long", "int"] => TypeKind::Long,
            ["long", "long"] | ["long", "long", "int"] => TypeKind::LongLong,
            ["float"] => TypeKind::Float,
            ["double"] | ["long", "double"] => TypeKind::Double,
            ["void"] => TypeKind::Void,
            ["struct" | "class" | "union", ..] => TypeKind::Struct,
            ["enum", ..] => TypeKind::Enum,
            _ => return None,
        };
        Some(Type::new(name, kind))
    }
}

/// Reduce `ptype` console output to a single type name.
///
/// The body between braces is dropped and the declarator after it kept, so
/// `type = class Foo : public Bar {...} *` becomes `class Foo *`.
pub(crate) fn condense_ptype(text: &str) -> Option<String> {
    let start = text.find("type = ")?;
    let body = text[start + "type = ".len()..].trim();

    let (head, tail) = match (body.find('{'), body.rfind('}')) {
        (Some(open), Some(close)) if open < close => (&body[..open], body[close + 1..].trim()),
        _ => (body, ""),
    };
    let head = head.trim();
    let head = match head.find(" : ") {
        Some(pos) => head[..pos].trim(),
        None => head,
    };
    if head.is_empty() {
        return None;
    }

    if tail.is_empty() {
        Some(head.to_string())
    } else {
        Some(format!("{head} {tail}"))
    }
}
