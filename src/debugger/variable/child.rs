//! Child expression synthesis.
//!
//! The debugger names children by bare field names or indexes, these functions
//! build an expression that evaluates to the child on its own.
use crate::debugger::variable::r#type::{Type, TypeKind};

/// `public`, `private` and `protected` pseudo-fields group the real members of a
/// C++ class. They are never shown, their children are spliced into the parent.
pub(crate) fn is_access_qualifier(exp: &str, child_type: Option<&str>) -> bool {
    child_type.is_none() && matches!(exp, "public" | "private" | "protected")
}

/// Expression of a child named `exp` of a parent expression with a resolved type.
///
/// A child whose name equals its type name is a base class subobject and is
/// addressed through a cast.
pub(crate) fn child_expression(
    parent: &str,
    parent_type: &Type,
    exp: &str,
    child_type: Option<&str>,
) -> String {
    let base_class = child_type.is_some_and(|t| t.trim() == exp);
    let fields = |kind: Option<TypeKind>| matches!(kind, Some(TypeKind::Struct | TypeKind::Incomplete));

    match parent_type.kind {
        TypeKind::Struct | TypeKind::Incomplete if base_class => {
            format!("(struct '{exp}')({parent})")
        }
        TypeKind::Pointer if base_class && fields(parent_type.target_kind()) => {
            format!("(struct '{exp}')(*{parent})")
        }
        TypeKind::Reference if base_class && fields(parent_type.target_kind()) => {
            format!("(struct '{exp}')({parent})")
        }
        TypeKind::Struct | TypeKind::Incomplete => format!("({parent}).{exp}"),
        TypeKind::Pointer if fields(parent_type.target_kind()) => format!("({parent})->{exp}"),
        TypeKind::Pointer => format!("*({parent})"),
        TypeKind::Reference => match parent_type.target_kind() {
            Some(TypeKind::Pointer) => format!("({parent})->{exp}"),
            Some(TypeKind::Array) => format!("({parent})[{exp}]"),
            _ => format!("({parent}).{exp}"),
        },
        TypeKind::Array => format!("({parent})[{exp}]"),
        _ => format!("({parent}).{exp}"),
    }
}
