//! Variable binder.
//!
//! A [`VariableDescriptor`] names an expression in some thread and frame. Binding it
//! creates a debugger-side variable object, represented by a [`Variable`]. Types,
//! values and children of a bound variable are resolved lazily.
pub mod child;
pub mod r#type;
pub mod value;

pub use r#type::{Type, TypeKind};
pub use value::{Format, ScalarValue};

use crate::debugger::frame::{parse_address, StackFrame};
use crate::debugger::{Error, Target, ValueChanged};
use crate::mi::{MiCommand, Reply, Tuple, Value};
use crate::{muted_error, weak_error};
use child::{child_expression, is_access_qualifier};
use log::debug;
use lru::LruCache;
use once_cell::sync::OnceCell;
use r#type::condense_ptype;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// Additional interpretation applied to a variable expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cast {
    /// `(type)(expr)`
    Type(String),
    /// `*((expr)+start)@len`
    Array { start: usize, len: usize },
}

/// Request to bind an expression in a thread and frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableDescriptor {
    /// Display name.
    pub name: String,
    /// Expression that evaluates to the variable on its own.
    pub qualified_name: String,
    /// Position among the siblings.
    pub position: usize,
    pub thread: u32,
    /// Frame for locals and arguments, `None` for globals.
    pub frame: Option<StackFrame>,
    pub type_name: Option<String>,
    pub cast: Option<Cast>,
}

impl VariableDescriptor {
    pub fn in_frame(name: &str, position: usize, frame: &StackFrame) -> Self {
        Self {
            name: name.to_string(),
            qualified_name: name.to_string(),
            position,
            thread: frame.thread,
            frame: Some(frame.clone()),
            type_name: None,
            cast: None,
        }
    }

    pub fn global(name: &str, thread: u32) -> Self {
        Self {
            name: name.to_string(),
            qualified_name: name.to_string(),
            position: 0,
            thread,
            frame: None,
            type_name: None,
            cast: None,
        }
    }

    pub fn with_cast(mut self, cast: Cast) -> Self {
        self.cast = Some(cast);
        self
    }

    /// Expression posted to the debugger, cast applied.
    pub fn expression(&self) -> String {
        let qn = &self.qualified_name;
        match &self.cast {
            None => qn.clone(),
            Some(Cast::Type(ty)) => format!("({ty})({qn})"),
            Some(Cast::Array { start, len }) => format!("*(({qn})+{start})@{len}"),
        }
    }

    fn same_binding(&self, other: &VariableDescriptor) -> bool {
        let same_frame = match (&self.frame, &other.frame) {
            (Some(a), Some(b)) => a.same_activation(b),
            (None, None) => true,
            _ => false,
        };
        self.thread == other.thread && same_frame && self.expression() == other.expression()
    }
}

/// A descriptor bound to a debugger variable object.
///
/// The object name is stable for the lifetime of the variable.
pub struct Variable {
    descriptor: VariableDescriptor,
    object: String,
    type_name: String,
    children_count: u32,
    ty: OnceCell<Type>,
    value: Mutex<Option<String>>,
    children: Mutex<Option<Vec<Arc<Variable>>>>,
    format: Mutex<Format>,
    address: OnceCell<Option<u64>>,
}

impl Variable {
    fn from_reply(descriptor: VariableDescriptor, record: &Tuple) -> Result<Self, Error> {
        Ok(Self {
            descriptor,
            object: record
                .get_str("name")
                .ok_or(Error::MissingField("name"))?
                .to_string(),
            type_name: record.get_str("type").unwrap_or_default().to_string(),
            children_count: record.get_parsed("numchild").unwrap_or_default(),
            ty: OnceCell::new(),
            value: Mutex::new(record.get_str("value").map(ToString::to_string)),
            children: Mutex::default(),
            format: Mutex::default(),
            address: OnceCell::new(),
        })
    }

    pub fn descriptor(&self) -> &VariableDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn expression(&self) -> String {
        self.descriptor.expression()
    }

    /// Debugger-side variable object name.
    pub fn object(&self) -> &str {
        &self.object
    }

    /// Type name as reported by the debugger.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn children_count(&self) -> u32 {
        self.children_count
    }

    pub fn format(&self) -> Format {
        *self.format.lock().unwrap()
    }

    pub fn cached_value(&self) -> Option<String> {
        self.value.lock().unwrap().clone()
    }

    pub(crate) fn set_cached_value(&self, value: Option<String>) {
        *self.value.lock().unwrap() = value;
    }

    /// Find this variable or one of its materialized descendants by object name.
    fn find(self: &Arc<Self>, object: &str) -> Option<Arc<Variable>> {
        if self.object == object {
            return Some(self.clone());
        }
        let children = self.children.lock().unwrap();
        children
            .iter()
            .flatten()
            .find_map(|child| child.find(object))
    }
}

type TypeKey = (u32, Option<(u32, u32)>, String);

/// Bound root variables and the type resolution cache.
pub struct VariableRegistry {
    roots: Mutex<Vec<Arc<Variable>>>,
    autoupdate: AtomicBool,
    types: Mutex<LruCache<TypeKey, Type>>,
}

impl VariableRegistry {
    pub(crate) fn new(autoupdate: bool, type_cache_size: usize) -> Self {
        let capacity = NonZeroUsize::new(type_cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            roots: Mutex::default(),
            autoupdate: AtomicBool::new(autoupdate),
            types: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub fn autoupdate(&self) -> bool {
        self.autoupdate.load(Ordering::SeqCst)
    }

    pub fn set_autoupdate(&self, autoupdate: bool) {
        self.autoupdate.store(autoupdate, Ordering::SeqCst)
    }

    pub(crate) fn clear_types(&self) {
        self.types.lock().unwrap().clear();
    }

    fn find(&self, descriptor: &VariableDescriptor) -> Option<Arc<Variable>> {
        self.roots
            .lock()
            .unwrap()
            .iter()
            .find(|v| v.descriptor.same_binding(descriptor))
            .cloned()
    }
}

/// Outcome of a variable object update.
#[derive(Default)]
pub(crate) struct UpdateResult {
    pub changed: Vec<(String, String)>,
    pub out_of_scope: Vec<String>,
}

fn names(values: Vec<&Value>) -> Vec<String> {
    values
        .into_iter()
        .filter_map(|v| match v {
            Value::Const(name) => Some(name.clone()),
            Value::Tuple(t) => t.get_str("name").map(ToString::to_string),
            _ => None,
        })
        .collect()
}

impl Target {
    pub fn variable_autoupdate(&self) -> bool {
        self.variables.autoupdate()
    }

    pub fn set_variable_autoupdate(&self, autoupdate: bool) {
        self.variables.set_autoupdate(autoupdate)
    }

    /// Local variables of a frame.
    pub fn local_variables(&self, frame: &StackFrame) -> Result<Vec<VariableDescriptor>, Error> {
        let reply = {
            let mut cache = self.threads.lock().unwrap();
            self.switch_frame(&mut cache, frame)?;
            self.exec(&MiCommand::new("stack-list-locals").param("0"))?
        };
        Ok(names(reply.results.get_items("locals"))
            .iter()
            .enumerate()
            .map(|(pos, name)| VariableDescriptor::in_frame(name, pos, frame))
            .collect())
    }

    /// Arguments of a frame.
    pub fn argument_variables(
        &self,
        frame: &StackFrame,
    ) -> Result<Vec<VariableDescriptor>, Error> {
        let level = frame.wire_level().to_string();
        let reply = {
            let mut cache = self.threads.lock().unwrap();
            self.switch_thread(&mut cache, frame.thread)?;
            self.exec(
                &MiCommand::new("stack-list-arguments")
                    .param("0")
                    .param(level.as_str())
                    .param(level.as_str()),
            )?
        };

        let args = reply
            .results
            .get_items("stack-args")
            .into_iter()
            .filter_map(Value::as_tuple)
            .find(|f| f.get_str("level") == Some(level.as_str()))
            .map(|f| names(f.get_items("args")))
            .unwrap_or_default();
        Ok(args
            .iter()
            .enumerate()
            .map(|(pos, name)| VariableDescriptor::in_frame(name, pos, frame))
            .collect())
    }

    /// Descriptor of a global variable, evaluated in the context of the current thread.
    pub fn global_variable(&self, name: &str) -> VariableDescriptor {
        VariableDescriptor::global(name, self.current_thread_id())
    }

    /// Bound root variables.
    pub fn variables(&self) -> Vec<Arc<Variable>> {
        self.variables.roots.lock().unwrap().clone()
    }

    /// Bind a descriptor. An existing binding of the same expression in the same
    /// thread and frame is returned instead of a new one.
    pub fn create_variable(&self, descriptor: &VariableDescriptor) -> Result<Arc<Variable>, Error> {
        let (var, fresh) = self.bind(descriptor)?;
        if fresh {
            self.variables.roots.lock().unwrap().push(var.clone());
        }
        Ok(var)
    }

    /// Bind a descriptor without registering it, return the variable and whether it
    /// was created by this call.
    pub(crate) fn bind(
        &self,
        descriptor: &VariableDescriptor,
    ) -> Result<(Arc<Variable>, bool), Error> {
        if let Some(var) = self.variables.find(descriptor) {
            return Ok((var, false));
        }

        let reply = {
            let mut cache = self.threads.lock().unwrap();
            let frame_mark = match &descriptor.frame {
                Some(frame) => {
                    self.switch_frame(&mut cache, frame)?;
                    "*"
                }
                None => {
                    self.switch_thread(&mut cache, descriptor.thread)?;
                    "@"
                }
            };
            self.exec(
                &MiCommand::new("var-create")
                    .param("-")
                    .param(frame_mark)
                    .param(descriptor.expression()),
            )?
        };

        let var = Variable::from_reply(descriptor.clone(), &reply.results)?;
        debug!(target: "debugger", "bind `{}` as {}", descriptor.expression(), var.object);
        Ok((Arc::new(var), true))
    }

    /// Release a variable object.
    pub fn destroy_variable(&self, var: &Variable) -> Result<(), Error> {
        self.variables
            .roots
            .lock()
            .unwrap()
            .retain(|v| v.object != var.object);
        self.destroy_object(var)
    }

    pub(crate) fn destroy_object(&self, var: &Variable) -> Result<(), Error> {
        self.exec(&MiCommand::new("var-delete").param(var.object.as_str()))?;
        Ok(())
    }

    /// Resolved type of a variable, never fails: unresolvable types are incomplete.
    pub fn variable_type<'a>(&self, var: &'a Variable) -> &'a Type {
        var.ty.get_or_init(|| self.resolve_type(var))
    }

    fn resolve_type(&self, var: &Variable) -> Type {
        let frame = var.descriptor.frame.as_ref();
        let key = (
            var.descriptor.thread,
            frame.map(|f| (f.level, f.depth)),
            var.type_name.clone(),
        );
        if let Some(ty) = self.variables.types.lock().unwrap().get(&key) {
            return ty.clone();
        }

        let ty = Type::parse(&var.type_name)
            .or_else(|| {
                self.detail_type(var, &var.type_name)
                    .and_then(|name| Type::parse(&name))
            })
            .or_else(|| {
                self.detail_type(var, &var.expression())
                    .and_then(|name| Type::parse(&name))
            })
            .unwrap_or_else(|| Type::incomplete(&var.type_name));

        self.variables.types.lock().unwrap().put(key, ty.clone());
        ty
    }

    /// `ptype` of a type name or an expression in the variable context.
    fn detail_type(&self, var: &Variable, what: &str) -> Option<String> {
        if what.trim().is_empty() {
            return None;
        }
        let reply = {
            let mut cache = self.threads.lock().unwrap();
            let _quiet = self.channel.quiet();
            match &var.descriptor.frame {
                Some(frame) => muted_error!(self.switch_frame(&mut cache, frame))?,
                None => muted_error!(self.switch_thread(&mut cache, var.descriptor.thread))?,
            }
            muted_error!(self.exec(&MiCommand::cli(format!("ptype {what}"))))?
        };
        condense_ptype(&reply.console_text())
    }

    /// Current value text of a variable.
    pub fn variable_value(&self, var: &Variable) -> Result<String, Error> {
        if let Some(value) = var.cached_value() {
            return Ok(value);
        }
        let reply = self.exec(&MiCommand::new("var-evaluate-expression").param(var.object.as_str()))?;
        let value = reply.field("value")?.to_string();
        var.set_cached_value(Some(value.clone()));
        Ok(value)
    }

    /// Value decoded by the variable type.
    pub fn variable_scalar(&self, var: &Variable) -> Result<ScalarValue, Error> {
        let text = self.variable_value(var)?;
        Ok(value::decode(self.variable_type(var).kind, &text))
    }

    /// Children of a variable, created on first request.
    pub fn variable_children(&self, var: &Variable) -> Result<Vec<Arc<Variable>>, Error> {
        if let Some(children) = var.children.lock().unwrap().as_ref() {
            return Ok(children.clone());
        }

        let parent_type = self.variable_type(var).clone();
        let mut children = vec![];
        self.list_children(var, &var.object, &parent_type, &mut children)?;

        let mut cached = var.children.lock().unwrap();
        Ok(cached.get_or_insert(children).clone())
    }

    fn list_children(
        &self,
        parent: &Variable,
        object: &str,
        parent_type: &Type,
        out: &mut Vec<Arc<Variable>>,
    ) -> Result<(), Error> {
        let reply = self.exec(&MiCommand::new("var-list-children").param(object))?;
        for record in reply
            .results
            .get_items("children")
            .into_iter()
            .filter_map(Value::as_tuple)
        {
            let exp = record.get_str("exp").unwrap_or_default();
            let child_type = record.get_str("type");

            if is_access_qualifier(exp, child_type) {
                let name = record.get_str("name").ok_or(Error::MissingField("name"))?;
                self.list_children(parent, name, parent_type, out)?;
                continue;
            }

            let descriptor = VariableDescriptor {
                name: exp.to_string(),
                qualified_name: child_expression(
                    &parent.expression(),
                    parent_type,
                    exp,
                    child_type,
                ),
                position: out.len(),
                thread: parent.descriptor.thread,
                frame: parent.descriptor.frame.clone(),
                type_name: child_type.map(ToString::to_string),
                cast: None,
            };
            out.push(Arc::new(Variable::from_reply(descriptor, record)?));
        }
        Ok(())
    }

    /// Assign a new value.
    ///
    /// A value change event is always fired, with autoupdate on registers,
    /// expressions, variables and memory are refreshed afterwards.
    pub fn set_variable_value(&self, var: &Variable, value: &str) -> Result<(), Error> {
        let reply = self.exec(
            &MiCommand::new("var-assign")
                .param(var.object.as_str())
                .param(value),
        )?;
        let value = reply.results.get_str("value").unwrap_or(value).to_string();
        var.set_cached_value(Some(value.clone()));

        self.hooks.on_value_changed(&ValueChanged::Variable {
            object: var.object.clone(),
            expression: var.expression(),
            value,
        });
        self.cascade_update();
        Ok(())
    }

    /// Change display format, return the value in the new format.
    pub fn set_variable_format(&self, var: &Variable, format: Format) -> Result<String, Error> {
        let reply = self.exec(
            &MiCommand::new("var-set-format")
                .param(var.object.as_str())
                .param(format.to_string()),
        )?;
        let value = reply.field("value")?.to_string();
        *var.format.lock().unwrap() = format;
        var.set_cached_value(Some(value.clone()));
        Ok(value)
    }

    /// Address of a variable, `None` if it has none.
    pub fn variable_address(&self, var: &Arc<Variable>) -> Result<Option<u64>, Error> {
        if let Some(addr) = var.address.get() {
            return Ok(*addr);
        }

        let descriptor = VariableDescriptor {
            name: format!("&{}", var.name()),
            qualified_name: format!("&({})", var.expression()),
            cast: None,
            ..var.descriptor.clone()
        };
        let (address_var, fresh) = self.bind(&descriptor)?;
        // an address binding that resolves back to the variable itself has no address
        if Arc::ptr_eq(&address_var, var) || address_var.object == var.object {
            let _ = var.address.set(None);
            return Ok(None);
        }

        let result = self
            .set_variable_format(&address_var, Format::Hexadecimal)
            .map(|text| parse_address(&text));
        if fresh {
            weak_error!(self.destroy_object(&address_var), "release address binding:");
        }

        let addr = result?;
        let _ = var.address.set(addr);
        Ok(addr)
    }

    /// Update a variable object and its children, return changed values and objects
    /// that went out of scope.
    pub(crate) fn update_object(&self, object: &str) -> Result<UpdateResult, Error> {
        let reply: Reply = self.exec(
            &MiCommand::new("var-update")
                .option("--all-values")
                .param(object),
        )?;

        let mut result = UpdateResult::default();
        for change in reply
            .results
            .get_items("changelist")
            .into_iter()
            .filter_map(Value::as_tuple)
        {
            let Some(name) = change.get_str("name") else {
                continue;
            };
            match change.get_str("in_scope") {
                Some("false" | "invalid") => result.out_of_scope.push(name.to_string()),
                _ => {
                    if let Some(value) = change.get_str("value") {
                        result.changed.push((name.to_string(), value.to_string()));
                    }
                }
            }
        }
        Ok(result)
    }

    /// Refresh all bound variables, firing change events and dropping variables
    /// that left their scope.
    pub fn update_variables(&self) -> Result<(), Error> {
        for root in self.variables() {
            let update = self.update_object(&root.object)?;

            for (object, value) in update.changed {
                let Some(var) = root.find(&object) else {
                    continue;
                };
                var.set_cached_value(Some(value.clone()));
                self.hooks.on_value_changed(&ValueChanged::Variable {
                    object,
                    expression: var.expression(),
                    value,
                });
            }

            if update.out_of_scope.iter().any(|o| o == &root.object) {
                debug!(target: "debugger", "`{}` out of scope", root.expression());
                weak_error!(self.destroy_variable(&root), "destroy variable:");
            }
        }
        Ok(())
    }
}
