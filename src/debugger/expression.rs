use crate::debugger::frame::StackFrame;
use crate::debugger::variable::{Variable, VariableDescriptor};
use crate::debugger::{Error, Target, ValueChanged};
use crate::weak_error;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// A watched expression. It is evaluated as a bound variable in the frame it was
/// last evaluated in.
pub struct Expression {
    id: u32,
    text: String,
    variable: Mutex<Option<Arc<Variable>>>,
}

impl Expression {
    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn variable(&self) -> Option<Arc<Variable>> {
        self.variable.lock().unwrap().clone()
    }
}

pub struct ExpressionRegistry {
    next_id: AtomicU32,
    autoupdate: AtomicBool,
    expressions: Mutex<Vec<Arc<Expression>>>,
}

impl ExpressionRegistry {
    pub(crate) fn new(autoupdate: bool) -> Self {
        Self {
            next_id: AtomicU32::new(1),
            autoupdate: AtomicBool::new(autoupdate),
            expressions: Mutex::default(),
        }
    }

    pub fn autoupdate(&self) -> bool {
        self.autoupdate.load(Ordering::SeqCst)
    }

    pub fn set_autoupdate(&self, autoupdate: bool) {
        self.autoupdate.store(autoupdate, Ordering::SeqCst)
    }
}

impl Target {
    pub fn expression_autoupdate(&self) -> bool {
        self.expressions.autoupdate()
    }

    pub fn set_expression_autoupdate(&self, autoupdate: bool) {
        self.expressions.set_autoupdate(autoupdate)
    }

    /// Register an expression. Nothing is evaluated until a value is requested.
    pub fn create_expression(&self, text: &str) -> Arc<Expression> {
        let expression = Arc::new(Expression {
            id: self.expressions.next_id.fetch_add(1, Ordering::SeqCst),
            text: text.trim().to_string(),
            variable: Mutex::default(),
        });
        self.expressions
            .expressions
            .lock()
            .unwrap()
            .push(expression.clone());
        expression
    }

    pub fn expressions(&self) -> Vec<Arc<Expression>> {
        self.expressions.expressions.lock().unwrap().clone()
    }

    /// Value of an expression in a frame, or in the current thread if no frame given.
    ///
    /// The expression is rebound when evaluated in a different frame.
    pub fn expression_value(
        &self,
        expression: &Expression,
        frame: Option<&StackFrame>,
    ) -> Result<String, Error> {
        let descriptor = match frame {
            Some(frame) => VariableDescriptor::in_frame(&expression.text, 0, frame),
            None => self.global_variable(&expression.text),
        };

        let variable = {
            let mut bound = expression.variable.lock().unwrap();
            match bound.as_ref() {
                Some(var) if var.descriptor() == &descriptor => var.clone(),
                _ => {
                    if let Some(old) = bound.take() {
                        weak_error!(self.destroy_object(&old), "release expression:");
                    }
                    let (var, _) = self.bind(&descriptor)?;
                    *bound = Some(var.clone());
                    var
                }
            }
        };
        self.variable_value(&variable)
    }

    /// Forget an expression and release its binding.
    pub fn destroy_expression(&self, expression: &Expression) -> Result<(), Error> {
        self.expressions
            .expressions
            .lock()
            .unwrap()
            .retain(|e| e.id != expression.id);
        match expression.variable.lock().unwrap().take() {
            Some(var) => self.destroy_object(&var),
            None => Ok(()),
        }
    }

    /// Re-evaluate bound expressions, fire change events for changed values.
    pub fn update_expressions(&self) -> Result<(), Error> {
        for expression in self.expressions() {
            let Some(var) = expression.variable() else {
                continue;
            };
            let update = self.update_object(var.object())?;

            if update.out_of_scope.iter().any(|o| o == var.object()) {
                *expression.variable.lock().unwrap() = None;
                weak_error!(self.destroy_object(&var), "release expression:");
                continue;
            }
            for (object, value) in update.changed {
                if object == var.object() {
                    var.set_cached_value(Some(value.clone()));
                    self.hooks.on_value_changed(&ValueChanged::Expression {
                        id: expression.id,
                        value,
                    });
                }
            }
        }
        Ok(())
    }
}
