//! Statement execution.
//!
//! The runtime is interpreter-agnostic: it drives anything that implements
//! [`StatementExecutor`], handing it one statement at a time plus an
//! [`ExecEnv`] with the live subsystems. [`AuraExecutor`] is the built-in
//! tree walker over [`StmtKind`].
//!
//! Error handling follows one rule: each statement is wrapped in
//! [`safe_execute`], so raw [`Fault`]s are classified with that statement's
//! source context, while an [`AuraError`] raised by a nested statement
//! passes through with the inner (more precise) context already attached.

use crate::program::{BinOp, Expr, FunctionDef, Stmt, StmtKind};
use crate::runtime::errors::{safe_execute, AuraError, ErrorContext, Failure, Fault};
use crate::runtime::events::{EventData, EventQueue};
use crate::runtime::governor::ResourceTracker;
use crate::runtime::recorder::{
    ExecutionRecorder, EVENT_FUNCTION_CALL, EVENT_FUNCTION_RETURN, EVENT_VARIABLE_SET,
};
use crate::runtime::state::StateManager;
use crate::value::Value;

/// Live subsystem handles passed to an executor for one statement.
pub struct ExecEnv<'a> {
    pub state: &'a mut StateManager,
    pub tracker: &'a ResourceTracker,
    pub output: &'a mut OutputBuffer,
    pub events: &'a EventQueue,
    pub recorder: &'a ExecutionRecorder,
}

/// Anything that can execute one statement against an [`ExecEnv`].
pub trait StatementExecutor {
    fn execute(&mut self, stmt: &Stmt, env: &mut ExecEnv<'_>) -> Result<(), AuraError>;
}

/// Captured `print` output.
///
/// The engine never writes to stdout directly; prints land here and the UI
/// (or a test) reads them back.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffer {
    lines: Vec<OutputLine>,
}

/// One printed line plus the source line that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputLine {
    pub text: String,
    pub line: Option<usize>,
}

impl OutputBuffer {
    pub fn new() -> Self {
        OutputBuffer::default()
    }

    pub fn print(&mut self, text: impl Into<String>, line: Option<usize>) {
        self.lines.push(OutputLine {
            text: text.into(),
            line,
        });
    }

    pub fn lines(&self) -> &[OutputLine] {
        &self.lines
    }

    pub fn text_lines(&self) -> Vec<String> {
        self.lines.iter().map(|line| line.text.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

/// The built-in tree-walking executor.
#[derive(Debug, Clone, Copy, Default)]
pub struct AuraExecutor;

impl AuraExecutor {
    pub fn new() -> Self {
        AuraExecutor
    }

    fn exec_stmt(&mut self, stmt: &Stmt, env: &mut ExecEnv<'_>) -> Result<(), Failure> {
        match &stmt.kind {
            StmtKind::Set { name, expr } => {
                let value = self.eval(expr, env)?;
                // Only a brand-new binding in the innermost scope grows the
                // variable count; overwriting or shadow-writing does not.
                if !env.state.current_vars().contains_key(name) {
                    env.tracker.check_variables(env.state.var_count() + 1)?;
                }
                env.state.set_var(name.clone(), value.clone());
                let mut data = EventData::default();
                data.insert("name".to_string(), Value::Str(name.clone()));
                data.insert("value".to_string(), value);
                env.recorder.record_event(EVENT_VARIABLE_SET, data);
                Ok(())
            }
            StmtKind::Print(expr) => {
                let value = self.eval(expr, env)?;
                env.output.print(value.to_string(), stmt.line);
                Ok(())
            }
            StmtKind::If {
                condition,
                body,
                else_body,
            } => {
                if self.eval(condition, env)?.is_truthy() {
                    self.exec_block(body, env)
                } else {
                    self.exec_block(else_body, env)
                }
            }
            StmtKind::Repeat { count, body } => {
                for _ in 0..*count {
                    env.tracker.check_iterations()?;
                    env.tracker.check_execution_time()?;
                    self.exec_block(body, env)?;
                }
                Ok(())
            }
            StmtKind::FunctionDef { name, body } => {
                if !env.state.has_function(name) {
                    env.tracker.check_functions(env.state.function_count() + 1)?;
                }
                env.state.register_function(FunctionDef {
                    name: name.clone(),
                    body: body.clone(),
                });
                Ok(())
            }
            StmtKind::Call { name } => self.call_function(name, env),
        }
    }

    fn exec_block(&mut self, body: &[Stmt], env: &mut ExecEnv<'_>) -> Result<(), Failure> {
        for stmt in body {
            self.execute(stmt, env)?;
        }
        Ok(())
    }

    fn call_function(&mut self, name: &str, env: &mut ExecEnv<'_>) -> Result<(), Failure> {
        let def = env.state.get_function(name)?.clone();
        env.tracker.check_recursion(env.state.call_depth() + 1)?;

        let mut data = EventData::default();
        data.insert("name".to_string(), Value::Str(name.to_string()));
        env.recorder.record_event(EVENT_FUNCTION_CALL, data.clone());

        env.state.push_call(name);
        env.state.push_scope();
        let result = self.exec_block(&def.body, env);
        env.state.pop_scope();
        env.state.pop_call();
        result?;

        env.recorder.record_event(EVENT_FUNCTION_RETURN, data);
        Ok(())
    }

    fn eval(&self, expr: &Expr, env: &ExecEnv<'_>) -> Result<Value, Failure> {
        match expr {
            Expr::Literal(value) => Ok(value.clone()),
            Expr::Var(name) => Ok(env.state.get_var(name)?),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(self.eval(item, env)?);
                }
                Ok(Value::List(values))
            }
            Expr::Binary { op, left, right } => {
                let left = self.eval(left, env)?;
                let right = self.eval(right, env)?;
                Self::apply(*op, left, right)
            }
        }
    }

    fn apply(op: BinOp, left: Value, right: Value) -> Result<Value, Failure> {
        match op {
            BinOp::Add => match (left, right) {
                (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
                (Value::Str(a), Value::Str(b)) => Ok(Value::Str(a + &b)),
                (Value::List(mut a), Value::List(b)) => {
                    a.extend(b);
                    Ok(Value::List(a))
                }
                (l, r) => Err(Self::type_fault(op, &l, &r)),
            },
            BinOp::Sub | BinOp::Mul | BinOp::Div => {
                let (a, b) = match (left.as_number(), right.as_number()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => return Err(Self::type_fault(op, &left, &right)),
                };
                match op {
                    BinOp::Sub => Ok(Value::Number(a - b)),
                    BinOp::Mul => Ok(Value::Number(a * b)),
                    BinOp::Div => {
                        if b == 0.0 {
                            Err(Fault::DivideByZero.into())
                        } else {
                            Ok(Value::Number(a / b))
                        }
                    }
                    _ => unreachable!(),
                }
            }
            BinOp::Eq => Ok(Value::Bool(left == right)),
            BinOp::Ne => Ok(Value::Bool(left != right)),
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                match (&left, &right) {
                    (Value::Number(a), Value::Number(b)) => Ok(Value::Bool(Self::compare(op, a, b))),
                    (Value::Str(a), Value::Str(b)) => Ok(Value::Bool(Self::compare(op, a, b))),
                    _ => Err(Self::type_fault(op, &left, &right)),
                }
            }
        }
    }

    fn compare<T: PartialOrd>(op: BinOp, a: &T, b: &T) -> bool {
        match op {
            BinOp::Lt => a < b,
            BinOp::Le => a <= b,
            BinOp::Gt => a > b,
            BinOp::Ge => a >= b,
            _ => unreachable!(),
        }
    }

    fn type_fault(op: BinOp, left: &Value, right: &Value) -> Failure {
        Fault::InvalidType(format!(
            "cannot apply '{}' to {} and {}",
            op.symbol(),
            left.type_name(),
            right.type_name()
        ))
        .into()
    }
}

impl StatementExecutor for AuraExecutor {
    fn execute(&mut self, stmt: &Stmt, env: &mut ExecEnv<'_>) -> Result<(), AuraError> {
        let context = ErrorContext {
            line_number: stmt.line,
            code_line: (!stmt.raw.is_empty()).then(|| stmt.raw.clone()),
            function_name: env.state.call_stack().last().cloned(),
            file_path: None,
        };
        safe_execute(context, || self.exec_stmt(stmt, env))
    }
}
