use crate::debugger::variable::TypeKind;
use crate::debugger::{Target, Variable};
use crate::weak_error;

const TAB: &str = "\t";
/// Nesting level after which aggregates are shown by their summary value.
const MAX_DEPTH: usize = 3;

pub fn render_variable(target: &Target, var: &Variable, depth: usize) -> String {
    let value = weak_error!(target.variable_value(var), "variable value:").unwrap_or_default();
    if var.children_count() == 0 || depth >= MAX_DEPTH {
        return format!("{}({value})", var.type_name());
    }

    let Some(children) = weak_error!(target.variable_children(var), "variable children:") else {
        return format!("{}({value})", var.type_name());
    };

    match target.variable_type(var).kind {
        TypeKind::Pointer | TypeKind::Reference if children.len() == 1 => {
            format!(
                "{}({value}) -> {}",
                var.type_name(),
                render_variable(target, &children[0], depth)
            )
        }
        _ => {
            let mut str_view = format!("{} {{", var.type_name());
            let tabs = TAB.repeat(depth + 1);

            for v in &children {
                str_view = format!("{str_view}\n");
                str_view = format!(
                    "{str_view}{tabs}{}: {}",
                    v.name(),
                    render_variable(target, v, depth + 1)
                );
            }

            format!("{str_view}\n{}}}", TAB.repeat(depth))
        }
    }
}
