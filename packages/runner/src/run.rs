use std::{ops::RangeInclusive, rc::Rc};

use strum::IntoEnumIterator;

use crate::{
    environment::{Env, ScopeKind},
    error::{ErrorKind, ExecutionError, RunResult},
    layout::{Diagnostic, IndentationPolicy},
    operators,
    stack::ensure_sufficient_stack,
    syntax_tree::{
        self, Argument, Body, ClassDef, ExceptHandler, ExceptPattern, Expression, FunctionDef,
        Literal, LogicalOp, Module, ParseError, Statement, StatementKind, Target, UnaryOp,
    },
    value::{Builtin, Class, Function, Instance, Value},
};

pub const DEFAULT_MAX_DEPTH: usize = 200;

#[derive(Clone, Debug)]
pub struct RunnerConfig {
    pub indentation: IndentationPolicy,
    /// Each statement and each loop iteration is one step. `None` runs
    /// forever if the program does.
    pub max_steps: Option<u64>,
    pub max_depth: usize,
    /// Write printed lines to stdout as well as collecting them.
    pub echo: bool,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            indentation: IndentationPolicy::default(),
            max_steps: None,
            max_depth: DEFAULT_MAX_DEPTH,
            echo: false,
        }
    }
}

#[derive(Debug)]
pub struct RunReport {
    /// Every line printed, including those before a failure.
    pub output: Vec<String>,
    pub diagnostics: Vec<Diagnostic>,
    pub error: Option<ExecutionError>,
}

impl RunReport {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Parse and run `source`.
///
/// Only a parse failure is an `Err`. A failure while running is reported in
/// [`RunReport::error`], alongside the output produced before it.
pub fn run_source(source: &str, config: &RunnerConfig) -> Result<RunReport, ParseError> {
    let module = syntax_tree::parse(source, config.indentation)?;
    let mut runner = Runner::new(config.clone());
    let error = runner.run(&module).err();

    Ok(RunReport {
        output: runner.into_output(),
        diagnostics: module.diagnostics().to_vec(),
        error,
    })
}

pub struct Runner {
    config: RunnerConfig,
    globals: Env,
    output: Vec<String>,
    steps: u64,
    depth: usize,
    line: usize,
}

/// How a block finished.
enum Flow {
    Normal,
    Break,
    Continue,
    Return(Value),
}

impl Runner {
    pub fn new(config: RunnerConfig) -> Self {
        let builtins = Env::module();

        for builtin in Builtin::iter() {
            builtins.define(builtin.to_string(), Value::Builtin(builtin));
        }

        Self {
            config,
            globals: builtins.child(ScopeKind::Module),
            output: Vec::new(),
            steps: 0,
            depth: 0,
            line: 0,
        }
    }

    pub fn run(&mut self, module: &Module) -> RunResult<()> {
        tracing::debug!(
            statements = module.body().iter().count(),
            "starting run"
        );
        let globals = self.globals.clone();
        let result = self.exec_body(module.body(), &globals);
        tracing::debug!(
            steps = self.steps,
            lines = self.output.len(),
            ok = result.is_ok(),
            "run finished"
        );

        result.map(|_flow| ())
    }

    pub fn output(&self) -> &[String] {
        &self.output
    }

    pub fn into_output(self) -> Vec<String> {
        self.output
    }

    /// Look up a global (or builtin) after a run.
    pub fn global(&self, name: &str) -> Option<Value> {
        self.globals.lookup(name)
    }

    /// `str(value)`, calling `__str__` or `__repr__` on instances.
    pub fn to_str(&mut self, value: &Value) -> RunResult<String> {
        match value {
            Value::Str(text) => Ok(text.to_string()),
            Value::Instance(instance) => match instance.attribute("__str__") {
                Some(method) => self.call_dunder(method, "__str__"),
                None => self.repr(value),
            },
            value => self.repr(value),
        }
    }

    /// `repr(value)`, calling `__repr__` on instances.
    pub fn repr(&mut self, value: &Value) -> RunResult<String> {
        Ok(match value {
            Value::None => "None".to_owned(),
            Value::Bool(true) => "True".to_owned(),
            Value::Bool(false) => "False".to_owned(),
            Value::Int(value) => value.to_string(),
            Value::Str(text) => quote(text),
            Value::List(items) => {
                // `__repr__` may touch the list, so don't hold the borrow.
                let items = items.borrow().clone();
                let items = items
                    .iter()
                    .map(|item| self.repr(item))
                    .collect::<RunResult<Vec<_>>>()?;
                format!("[{}]", items.join(", "))
            }
            Value::Function(function) => format!("<function {}>", function.name()),
            Value::BoundMethod(method) => format!(
                "<bound method {}.{}>",
                method.receiver.class().name(),
                method.function.name()
            ),
            Value::Builtin(builtin) => format!("<built-in function {builtin}>"),
            Value::Class(class) => format!("<class '{}'>", class.name()),
            Value::Instance(instance) => match instance.attribute("__repr__") {
                Some(method) => self.call_dunder(method, "__repr__")?,
                None => format!("<{} object>", instance.class().name()),
            },
        })
    }

    fn exec_body(&mut self, body: &Body, env: &Env) -> RunResult<Flow> {
        for statement in body.iter() {
            match self.exec(statement, env)? {
                Flow::Normal => (),
                flow => return Ok(flow),
            }
        }

        Ok(Flow::Normal)
    }

    fn exec(&mut self, statement: &Statement, env: &Env) -> RunResult<Flow> {
        let line = statement.span().line();
        self.line = line;
        self.step()?;

        match statement.kind() {
            StatementKind::Pass => (),
            StatementKind::Break => return Ok(Flow::Break),
            StatementKind::Continue => return Ok(Flow::Continue),
            StatementKind::Expression(expr) => {
                self.eval(expr, env)?;
            }
            StatementKind::Assign { target, value } => {
                let value = self.eval(value, env)?;
                self.assign(target, value, env)?;
            }
            StatementKind::AugmentedAssign { target, op, value } => match target {
                Target::Name(name) => {
                    let current = self.variable(name, env)?;
                    let rhs = self.eval(value, env)?;
                    let result = operators::binary(*op, &current, &rhs).map_err(|e| e.at(line))?;
                    env.define(name.as_str(), result);
                }
                Target::Attribute { object, name } => {
                    let object = self.eval(object, env)?;
                    let current = self.attribute(&object, name)?;
                    let rhs = self.eval(value, env)?;
                    let result = operators::binary(*op, &current, &rhs).map_err(|e| e.at(line))?;
                    self.set_attribute(&object, name, result)?;
                }
            },
            StatementKind::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval(expr, env)?,
                    None => Value::None,
                };

                return Ok(Flow::Return(value));
            }
            StatementKind::Import { modules } => {
                tracing::debug!(line, ?modules, "ignoring import");
            }
            StatementKind::FromImport { module, names } => {
                tracing::debug!(line, %module, ?names, "ignoring import");
            }
            StatementKind::If {
                branches,
                else_block,
            } => {
                for branch in branches {
                    if self.eval(&branch.condition, env)?.truthy() {
                        return self.exec_body(&branch.body, env);
                    }
                }

                if let Some(else_block) = else_block {
                    return self.exec_body(else_block, env);
                }
            }
            StatementKind::While { condition, body } => loop {
                self.line = line;

                if !self.eval(condition, env)?.truthy() {
                    break;
                }

                match self.exec_body(body, env)? {
                    Flow::Break => break,
                    Flow::Return(value) => return Ok(Flow::Return(value)),
                    Flow::Normal | Flow::Continue => (),
                }

                self.line = line;
                self.step()?;
            },
            StatementKind::For {
                variable,
                iterable,
                body,
            } => {
                let iterable = self.eval(iterable, env)?;

                for item in self.iterate(&iterable)? {
                    env.define(variable.as_str(), item);

                    match self.exec_body(body, env)? {
                        Flow::Break => break,
                        Flow::Return(value) => return Ok(Flow::Return(value)),
                        Flow::Normal | Flow::Continue => (),
                    }

                    self.line = line;
                    self.step()?;
                }
            }
            StatementKind::Try {
                body,
                handlers,
                else_block,
            } => return self.exec_try(body, handlers, else_block.as_ref(), env),
            StatementKind::FunctionDef(def) => self.define_function(def, env)?,
            StatementKind::ClassDef(class) => self.define_class(class, env)?,
        }

        Ok(Flow::Normal)
    }

    /// The protected block's `Result` is inspected here. A caught error stops
    /// propagating and execution carries on after the `try`.
    fn exec_try(
        &mut self,
        body: &Body,
        handlers: &[ExceptHandler],
        else_block: Option<&Body>,
        env: &Env,
    ) -> RunResult<Flow> {
        let error = match self.exec_body(body, env) {
            Ok(Flow::Normal) => {
                return match else_block {
                    Some(else_block) => self.exec_body(else_block, env),
                    None => Ok(Flow::Normal),
                }
            }
            Ok(flow) => return Ok(flow),
            Err(error) if error.is_catchable() => error,
            Err(error) => return Err(error),
        };

        let Some(handler) = handlers
            .iter()
            .find(|handler| catches(handler.pattern(), &error))
        else {
            return Err(error);
        };

        tracing::debug!(
            line = error.line(),
            kind = error.kind_name(),
            handler = handler.span().line(),
            "caught error"
        );

        if let Some(binding) = &handler.pattern().binding {
            env.define(binding.as_str(), Value::string(error.kind().message()));
        }

        self.line = handler.span().line();
        self.exec_body(handler.body(), env)
    }

    fn define_function(&mut self, def: &Rc<FunctionDef>, env: &Env) -> RunResult<()> {
        let defaults = def
            .params()
            .iter()
            .map(|param| {
                param
                    .default()
                    .map(|default| self.eval(default, env))
                    .transpose()
            })
            .collect::<RunResult<Vec<_>>>()?;
        let function = Function::new(def.clone(), defaults, env.closure_scope());
        env.define(def.name(), Value::Function(Rc::new(function)));

        Ok(())
    }

    fn define_class(&mut self, class: &ClassDef, env: &Env) -> RunResult<()> {
        let base = match class.base() {
            Some(base) => match self.eval(base, env)? {
                Value::Class(base) => Some(base),
                other => {
                    return Err(self.type_error(format!(
                        "base of class '{}' must be a class, not '{}'",
                        class.name(),
                        other.type_name()
                    )))
                }
            },
            None => None,
        };

        let class_env = env.child(ScopeKind::Class);
        self.exec_body(class.body(), &class_env)?;
        let value = Class::new(class.name(), base, class_env.take_bindings());
        env.define(class.name(), Value::Class(Rc::new(value)));

        Ok(())
    }

    fn assign(&mut self, target: &Target, value: Value, env: &Env) -> RunResult<()> {
        match target {
            Target::Name(name) => {
                env.define(name.as_str(), value);
                Ok(())
            }
            Target::Attribute { object, name } => {
                let object = self.eval(object, env)?;
                self.set_attribute(&object, name, value)
            }
        }
    }

    fn eval(&mut self, expr: &Expression, env: &Env) -> RunResult<Value> {
        ensure_sufficient_stack(|| self.eval_expression(expr, env))
    }

    fn eval_expression(&mut self, expr: &Expression, env: &Env) -> RunResult<Value> {
        Ok(match expr {
            Expression::Literal(literal) => match literal {
                Literal::Int(value) => Value::Int(*value),
                Literal::String(text) => Value::string(text.as_str()),
                Literal::Bool(value) => Value::Bool(*value),
                Literal::None => Value::None,
            },
            Expression::Variable { name } => self.variable(name, env)?,
            Expression::List(items) => Value::list(
                items
                    .iter()
                    .map(|item| self.eval(item, env))
                    .collect::<RunResult<Vec<_>>>()?,
            ),
            Expression::ListComprehension(comprehension) => {
                let iterable = self.eval(&comprehension.iterable, env)?;
                let scope = env.child(ScopeKind::Function);
                let mut items = Vec::new();

                for item in self.iterate(&iterable)? {
                    scope.define(comprehension.variable.as_str(), item);

                    if let Some(condition) = &comprehension.condition {
                        if !self.eval(condition, &scope)?.truthy() {
                            continue;
                        }
                    }

                    items.push(self.eval(&comprehension.element, &scope)?);
                }

                Value::list(items)
            }
            Expression::Attribute { object, name } => {
                let object = self.eval(object, env)?;
                self.attribute(&object, name)?
            }
            Expression::Call { callee, args } => {
                let callee = self.eval(callee, env)?;
                let mut positional = Vec::new();
                let mut keywords = Vec::new();

                for arg in args {
                    match arg {
                        Argument::Positional(value) => positional.push(self.eval(value, env)?),
                        Argument::Keyword { name, value } => {
                            keywords.push((name.clone(), self.eval(value, env)?))
                        }
                    }
                }

                self.call(callee, positional, keywords)?
            }
            Expression::Unary { op, operand } => {
                let operand = self.eval(operand, env)?;

                match op {
                    UnaryOp::Neg => operators::negate(&operand).map_err(|e| e.at(self.line))?,
                    UnaryOp::Not => Value::Bool(!operand.truthy()),
                }
            }
            Expression::Binary { op, lhs, rhs } => {
                let lhs = self.eval(lhs, env)?;
                let rhs = self.eval(rhs, env)?;
                operators::binary(*op, &lhs, &rhs).map_err(|e| e.at(self.line))?
            }
            Expression::Compare { op, lhs, rhs } => {
                let lhs = self.eval(lhs, env)?;
                let rhs = self.eval(rhs, env)?;
                Value::Bool(operators::compare(*op, &lhs, &rhs).map_err(|e| e.at(self.line))?)
            }
            Expression::Logical { op, lhs, rhs } => {
                let lhs = self.eval(lhs, env)?;

                match (op, lhs.truthy()) {
                    (LogicalOp::And, false) | (LogicalOp::Or, true) => lhs,
                    (LogicalOp::And, true) | (LogicalOp::Or, false) => self.eval(rhs, env)?,
                }
            }
        })
    }

    fn variable(&self, name: &str, env: &Env) -> RunResult<Value> {
        env.lookup(name)
            .ok_or_else(|| ErrorKind::Name(name.to_owned()).at(self.line))
    }

    fn attribute(&self, object: &Value, name: &str) -> RunResult<Value> {
        let found = match object {
            Value::Instance(instance) => instance.attribute(name),
            Value::Class(class) => class.lookup(name),
            _ => None,
        };

        found.ok_or_else(|| self.missing_attribute(object, name))
    }

    fn set_attribute(&self, object: &Value, name: &str, value: Value) -> RunResult<()> {
        match object {
            Value::Instance(instance) => instance.set_attribute(name, value),
            Value::Class(class) => class.set_attribute(name, value),
            _ => return Err(self.missing_attribute(object, name)),
        }

        Ok(())
    }

    fn missing_attribute(&self, object: &Value, name: &str) -> ExecutionError {
        let owner = match object {
            Value::Class(class) => format!("type object '{}'", class.name()),
            object => format!("'{}' object", object.type_name()),
        };

        ErrorKind::Attribute {
            owner,
            attribute: name.to_owned(),
        }
        .at(self.line)
    }

    fn call(
        &mut self,
        callee: Value,
        mut args: Vec<Value>,
        keywords: Vec<(String, Value)>,
    ) -> RunResult<Value> {
        match callee {
            Value::Function(function) => self.call_function(&function, args, keywords),
            Value::BoundMethod(method) => {
                args.insert(0, Value::Instance(method.receiver.clone()));
                self.call_function(&method.function, args, keywords)
            }
            Value::Builtin(builtin) => {
                if !keywords.is_empty() {
                    return Err(self.type_error(format!("{builtin}() takes no keyword arguments")));
                }

                self.call_builtin(builtin, args)
            }
            Value::Class(class) => self.instantiate(&class, args, keywords),
            other => Err(self.type_error(format!(
                "'{}' object is not callable",
                other.type_name()
            ))),
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(function = function.name(), depth = self.depth))]
    fn call_function(
        &mut self,
        function: &Rc<Function>,
        args: Vec<Value>,
        keywords: Vec<(String, Value)>,
    ) -> RunResult<Value> {
        if self.depth >= self.config.max_depth {
            return Err(ErrorKind::Recursion {
                limit: self.config.max_depth,
            }
            .at(self.line));
        }

        let env = function.closure().child(ScopeKind::Function);
        self.bind_arguments(function, args, keywords, &env)?;

        let caller_line = self.line;
        self.depth += 1;
        let result = ensure_sufficient_stack(|| self.exec_body(function.def().body(), &env));
        self.depth -= 1;
        let flow = result?;
        self.line = caller_line;

        Ok(match flow {
            Flow::Return(value) => value,
            Flow::Normal | Flow::Break | Flow::Continue => Value::None,
        })
    }

    fn bind_arguments(
        &self,
        function: &Function,
        args: Vec<Value>,
        keywords: Vec<(String, Value)>,
        env: &Env,
    ) -> RunResult<()> {
        let name = function.name();
        let params = function.def().params();

        if args.len() > params.len() {
            return Err(self.type_error(format!(
                "{name}() takes {} positional arguments but {} were given",
                params.len(),
                args.len()
            )));
        }

        let mut slots: Vec<Option<Value>> = args.into_iter().map(Some).collect();
        slots.resize(params.len(), None);

        for (keyword, value) in keywords {
            let Some(index) = params.iter().position(|param| param.name() == keyword) else {
                return Err(self.type_error(format!(
                    "{name}() got an unexpected keyword argument '{keyword}'"
                )));
            };

            if slots[index].is_some() {
                return Err(self.type_error(format!(
                    "{name}() got multiple values for argument '{keyword}'"
                )));
            }

            slots[index] = Some(value);
        }

        for (index, (param, slot)) in params.iter().zip(slots).enumerate() {
            let value = match slot.or_else(|| function.default(index).cloned()) {
                Some(value) => value,
                None => {
                    return Err(self.type_error(format!(
                        "{name}() missing required argument: '{}'",
                        param.name()
                    )))
                }
            };

            env.define(param.name(), value);
        }

        Ok(())
    }

    fn instantiate(
        &mut self,
        class: &Rc<Class>,
        mut args: Vec<Value>,
        keywords: Vec<(String, Value)>,
    ) -> RunResult<Value> {
        let instance = Rc::new(Instance::new(class.clone()));

        match class.lookup("__init__") {
            Some(Value::Function(init)) => {
                args.insert(0, Value::Instance(instance.clone()));
                let result = self.call_function(&init, args, keywords)?;

                if !matches!(result, Value::None) {
                    return Err(self.type_error(format!(
                        "__init__() should return None, not '{}'",
                        result.type_name()
                    )));
                }
            }
            _ if !args.is_empty() || !keywords.is_empty() => {
                return Err(self.type_error(format!("{}() takes no arguments", class.name())))
            }
            _ => (),
        }

        Ok(Value::Instance(instance))
    }

    fn call_builtin(&mut self, builtin: Builtin, args: Vec<Value>) -> RunResult<Value> {
        match builtin {
            Builtin::Print => {
                let text = args
                    .iter()
                    .map(|arg| self.to_str(arg))
                    .collect::<RunResult<Vec<_>>>()?
                    .join(" ");
                self.emit(text);
                Ok(Value::None)
            }
            Builtin::Str => {
                self.arity(builtin, &args, 0..=1)?;

                match args.first() {
                    Some(arg) => Ok(Value::string(self.to_str(arg)?)),
                    None => Ok(Value::string("")),
                }
            }
            Builtin::Repr => {
                self.arity(builtin, &args, 1..=1)?;
                Ok(Value::string(self.repr(&args[0])?))
            }
            Builtin::Len => {
                self.arity(builtin, &args, 1..=1)?;

                let len = match &args[0] {
                    Value::Str(text) => text.chars().count(),
                    Value::List(items) => items.borrow().len(),
                    other => {
                        return Err(self.type_error(format!(
                            "object of type '{}' has no len()",
                            other.type_name()
                        )))
                    }
                };

                i64::try_from(len)
                    .map(Value::Int)
                    .map_err(|_| ErrorKind::Overflow.at(self.line))
            }
            Builtin::Range => {
                self.arity(builtin, &args, 1..=2)?;
                let bounds = args
                    .iter()
                    .map(|arg| {
                        arg.as_int().ok_or_else(|| {
                            self.type_error(format!(
                                "'{}' object cannot be interpreted as an integer",
                                arg.type_name()
                            ))
                        })
                    })
                    .collect::<RunResult<Vec<_>>>()?;

                let (start, stop) = match *bounds.as_slice() {
                    [stop] => (0, stop),
                    [start, stop] => (start, stop),
                    _ => return Ok(Value::list(Vec::new())),
                };

                Ok(Value::list((start..stop).map(Value::Int)))
            }
        }
    }

    fn arity(&self, builtin: Builtin, args: &[Value], expected: RangeInclusive<usize>) -> RunResult<()> {
        if expected.contains(&args.len()) {
            return Ok(());
        }

        let (min, max) = (expected.start(), expected.end());
        let count = if min == max {
            format!("exactly {min}")
        } else if args.len() < *min {
            format!("at least {min}")
        } else {
            format!("at most {max}")
        };

        Err(self.type_error(format!(
            "{builtin}() takes {count} argument(s) ({} given)",
            args.len()
        )))
    }

    fn call_dunder(&mut self, method: Value, name: &str) -> RunResult<String> {
        match self.call(method, Vec::new(), Vec::new())? {
            Value::Str(text) => Ok(text.to_string()),
            other => Err(self.type_error(format!(
                "{name} returned non-string (type {})",
                other.type_name()
            ))),
        }
    }

    fn iterate(&self, value: &Value) -> RunResult<Vec<Value>> {
        match value {
            Value::List(items) => Ok(items.borrow().clone()),
            Value::Str(text) => Ok(text
                .chars()
                .map(|c| Value::string(c.to_string()))
                .collect()),
            other => Err(self.type_error(format!(
                "'{}' object is not iterable",
                other.type_name()
            ))),
        }
    }

    fn emit(&mut self, line: String) {
        if self.config.echo {
            println!("{line}");
        }

        self.output.push(line);
    }

    fn step(&mut self) -> RunResult<()> {
        self.steps += 1;

        match self.config.max_steps {
            Some(limit) if self.steps > limit => Err(ErrorKind::StepLimit { limit }.at(self.line)),
            _ => Ok(()),
        }
    }

    fn type_error(&self, message: String) -> ExecutionError {
        ErrorKind::type_error(message).at(self.line)
    }
}

fn catches(pattern: &ExceptPattern, error: &ExecutionError) -> bool {
    match pattern.exception.as_deref() {
        None | Some("Exception" | "BaseException") => true,
        Some("ArithmeticError") => matches!(
            error.kind(),
            ErrorKind::ZeroDivision | ErrorKind::Overflow
        ),
        Some(name) => name == error.kind_name(),
    }
}

/// A Python style string literal.
fn quote(text: &str) -> String {
    let delimiter = if text.contains('\'') && !text.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut quoted = String::with_capacity(text.len() + 2);
    quoted.push(delimiter);

    for c in text.chars() {
        match c {
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            c if c == delimiter => {
                quoted.push('\\');
                quoted.push(c);
            }
            c => quoted.push(c),
        }
    }

    quoted.push(delimiter);
    quoted
}
