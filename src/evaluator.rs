use thiserror::Error;

use crate::ast::{
    Expr, FunctionCall, RadBlock, RadStmt, RslTypeKind, Stmt, SwitchBlock, SwitchStmt, Token,
    TokenType,
};
use crate::builtins::{self, BuiltinKind};
use crate::context::RadContext;
use crate::env::Env;
use crate::json_path;
use crate::output;
use crate::value::{DynValue, Value};

/// Classification of runtime errors, per stage of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalErrorKind {
    /// Arithmetic or assignment on incompatible types, bad function args.
    Type,
    /// Undefined variable, JSON-path binding, or function.
    Name,
    /// HTTP transport, mock file, or response body failures.
    Io,
}

/// A fatal runtime error, citing the token where evaluation failed.
#[derive(Debug, Clone, Error)]
#[error("RslError at L{line}/{col} on '{lexeme}': {message}")]
pub struct EvalError {
    pub kind: EvalErrorKind,
    pub line: usize,
    pub col: usize,
    pub lexeme: String,
    pub message: String,
}

impl EvalError {
    fn with_kind(kind: EvalErrorKind, token: &Token, message: String) -> Self {
        EvalError {
            kind,
            line: token.line,
            col: token.col,
            lexeme: token.printable_lexeme(),
            message,
        }
    }

    pub fn type_error(token: &Token, message: String) -> Self {
        Self::with_kind(EvalErrorKind::Type, token, message)
    }

    pub fn name(token: &Token, message: String) -> Self {
        Self::with_kind(EvalErrorKind::Name, token, message)
    }

    pub fn io(token: &Token, message: String) -> Self {
        Self::with_kind(EvalErrorKind::Io, token, message)
    }
}

/// Tree-walking interpreter over the parsed statement list.
pub struct Evaluator<'a> {
    pub env: Env,
    ctx: &'a mut RadContext,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: &'a mut RadContext) -> Self {
        Evaluator {
            env: Env::new(),
            ctx,
        }
    }

    /// Bind resolved CLI arguments into the root environment before the
    /// script runs. Unset optionals stay unbound.
    pub fn init_args(&mut self, args: Vec<(String, Value)>) {
        for (name, value) in args {
            self.env.set(&name, value);
        }
    }

    pub fn run(&mut self, stmts: &[Stmt]) -> Result<(), EvalError> {
        for stmt in stmts {
            self.execute(stmt)?;
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<(), EvalError> {
        match stmt {
            // Handled during metadata extraction; nothing to do at runtime.
            Stmt::FileHeader { .. } | Stmt::ArgBlock { .. } => Ok(()),
            Stmt::Expression { expr } => {
                self.evaluate(expr)?;
                Ok(())
            }
            Stmt::FunctionStmt { call } => {
                self.call_statement(call)?;
                Ok(())
            }
            Stmt::PrimaryAssign { name, initializer } => {
                let value = self.evaluate(initializer)?;
                self.env.set(&name.lexeme, value);
                Ok(())
            }
            Stmt::ArrayAssign {
                name,
                array_type,
                initializer,
            } => {
                let value = self.evaluate(initializer)?;
                let coerced = coerce_to_declared_array(array_type.kind, value)
                    .map_err(|message| EvalError::type_error(initializer.token(), message))?;
                self.env.set(&name.lexeme, coerced);
                Ok(())
            }
            Stmt::JsonPathAssign { identifier, path } => {
                self.env.assign_json_field(identifier.clone(), path.clone());
                Ok(())
            }
            Stmt::SwitchAssign { identifiers, block } => self.execute_switch(identifiers, block),
            Stmt::RadBlock(block) => self.execute_rad_block(block),
        }
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal { token } => Ok(literal_value(token)),
            Expr::ArrayExpr { values, .. } => {
                let mut elements = Vec::with_capacity(values.len());
                for value_expr in values {
                    let value = self.evaluate(value_expr)?;
                    elements.push(DynValue::from_value(value));
                }
                Ok(Value::MixedArray(elements))
            }
            Expr::Variable { name } => self.env.get_by_token(name).map(Value::clone),
            Expr::Grouping { value } => self.evaluate(value),
            Expr::ArrayAccess {
                array,
                bracket,
                index,
            } => {
                let target = self.evaluate(array)?;
                let index = self.evaluate(index)?;
                self.index_array(bracket, target, index)
            }
            Expr::Call(call) => self.call_expression(call),
            Expr::Unary { operator, right } => {
                let value = self.evaluate(right)?;
                apply_unary(operator, value)
            }
            Expr::Logical {
                left,
                operator,
                right,
            } => self.eval_logical(left, operator, right),
            Expr::Binary {
                left,
                operator,
                right,
            } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                apply_binary(operator, left, right)
            }
        }
    }

    fn eval_logical(
        &mut self,
        left: &Expr,
        operator: &Token,
        right: &Expr,
    ) -> Result<Value, EvalError> {
        let left_bool = match self.evaluate(left)? {
            Value::Bool(b) => b,
            other => {
                return Err(EvalError::type_error(
                    operator,
                    format!("Cannot use '{}' on {}", operator.lexeme, other.type_name()),
                ))
            }
        };

        // Short-circuit before touching the right operand.
        match operator.lexeme.as_str() {
            "or" if left_bool => return Ok(Value::Bool(true)),
            "and" if !left_bool => return Ok(Value::Bool(false)),
            _ => {}
        }

        let right_value = self.evaluate(right)?;
        if let Value::Bool(_) = right_value {
            Ok(right_value)
        } else {
            Err(EvalError::type_error(
                operator,
                format!(
                    "Cannot use '{}' on {}",
                    operator.lexeme,
                    right_value.type_name()
                ),
            ))
        }
    }

    fn index_array(
        &self,
        bracket: &Token,
        target: Value,
        index: Value,
    ) -> Result<Value, EvalError> {
        let i = match index {
            Value::Int(i) => i,
            other => {
                return Err(EvalError::type_error(
                    bracket,
                    format!("Array index must be an int, got {}", other.type_name()),
                ))
            }
        };
        let Some(len) = target.array_len() else {
            return Err(EvalError::type_error(
                bracket,
                format!("Cannot index into {}", target.type_name()),
            ));
        };

        let resolved = if i < 0 { len as i64 + i } else { i };
        if resolved < 0 || resolved >= len as i64 {
            return Err(EvalError::type_error(
                bracket,
                format!("Array index out of bounds: {} (length {})", i, len),
            ));
        }
        let idx = resolved as usize;

        Ok(match target {
            Value::StringArray(arr) => Value::String(arr[idx].clone()),
            Value::IntArray(arr) => Value::Int(arr[idx]),
            Value::FloatArray(arr) => Value::Float(arr[idx]),
            Value::BoolArray(arr) => Value::Bool(arr[idx]),
            Value::MixedArray(arr) => arr[idx].clone().into_value(),
            _ => unreachable!("internal error: indexed non-array with known length"),
        })
    }

    fn call_expression(&mut self, call: &FunctionCall) -> Result<Value, EvalError> {
        let builtin = builtins::lookup(&call.function.lexeme).ok_or_else(|| {
            EvalError::name(
                &call.function,
                format!("Unknown function: {}", call.function.lexeme),
            )
        })?;
        if builtin.kind == BuiltinKind::Statement {
            return Err(EvalError::type_error(
                &call.function,
                format!(
                    "{}() does not return a value and cannot be used in an expression",
                    call.function.lexeme
                ),
            ));
        }

        let args = self.evaluate_args(&call.args)?;
        let result = builtins::call(self.ctx, &call.function, args)?;
        Ok(result.unwrap_or_else(|| {
            panic!("internal error: value builtin returned no value")
        }))
    }

    fn call_statement(&mut self, call: &FunctionCall) -> Result<Option<Value>, EvalError> {
        let args = self.evaluate_args(&call.args)?;
        builtins::call(self.ctx, &call.function, args)
    }

    fn evaluate_args(&mut self, exprs: &[Expr]) -> Result<Vec<Value>, EvalError> {
        let mut args = Vec::with_capacity(exprs.len());
        for expr in exprs {
            args.push(self.evaluate(expr)?);
        }
        Ok(args)
    }

    fn execute_switch(
        &mut self,
        identifiers: &[Token],
        block: &SwitchBlock,
    ) -> Result<(), EvalError> {
        let discriminator = match &block.discriminator {
            Some(token) => Some(
                self.env
                    .get_by_token_expecting(token, &["string", "int", "float", "bool"])?
                    .to_printable(),
            ),
            None => None,
        };

        let mut default_values = None;
        let mut selected = None;
        for stmt in &block.stmts {
            match stmt {
                SwitchStmt::Case { keys, values, .. } => {
                    if selected.is_none() {
                        if let Some(d) = &discriminator {
                            if keys.iter().any(|key| key.token.str_literal() == d) {
                                selected = Some(values);
                            }
                        }
                    }
                }
                SwitchStmt::Default { values, .. } => {
                    if default_values.is_none() {
                        default_values = Some(values);
                    }
                }
            }
        }

        let values = selected.or(default_values).ok_or_else(|| {
            EvalError::type_error(
                &block.switch_token,
                "Switch did not match any case and has no default".to_string(),
            )
        })?;

        debug_assert_eq!(values.len(), identifiers.len());
        let mut results = Vec::with_capacity(values.len());
        for value_expr in values {
            results.push(self.evaluate(value_expr)?);
        }
        for (identifier, value) in identifiers.iter().zip(results) {
            self.env.set(&identifier.lexeme, value);
        }
        Ok(())
    }

    fn execute_rad_block(&mut self, block: &RadBlock) -> Result<(), EvalError> {
        let url = match self.evaluate(&block.url)? {
            Value::String(url) => url,
            other => {
                return Err(EvalError::type_error(
                    block.url.token(),
                    format!("Expected url to be a string, got {}", other.type_name()),
                ))
            }
        };

        let RadStmt::Fields { identifiers } = block
            .stmts
            .iter()
            .find(|s| matches!(s, RadStmt::Fields { .. }))
            .expect("internal error: rad block without fields statement");

        let mut names = Vec::with_capacity(identifiers.len());
        let mut paths = Vec::with_capacity(identifiers.len());
        for identifier in identifiers {
            let field = self.env.get_json_field(identifier)?;
            names.push(identifier.lexeme.clone());
            paths.push(field.path.clone());
        }

        let RadContext {
            requester, printer, ..
        } = &mut *self.ctx;
        let doc = requester
            .request_json(&url, printer)
            .map_err(|message| EvalError::io(&block.rad_keyword, message))?;

        let columns = json_path::extract_columns(&doc, &paths)
            .map_err(|message| EvalError::type_error(&block.rad_keyword, message))?;

        let row_count = columns.first().map_or(0, |c| c.len());
        let mut rows = Vec::with_capacity(row_count);
        for row in 0..row_count {
            rows.push(
                columns
                    .iter()
                    .map(|column| column[row].clone())
                    .collect::<Vec<String>>(),
            );
        }

        for (identifier, column) in identifiers.iter().zip(columns) {
            self.env.set(&identifier.lexeme, Value::StringArray(column));
        }

        let table = output::render_table(&names, &rows);
        self.ctx.printer.print(&table);
        Ok(())
    }
}

fn literal_value(token: &Token) -> Value {
    match token.token_type {
        TokenType::StringLiteral => Value::String(token.str_literal().to_string()),
        TokenType::IntLiteral => Value::Int(token.int_literal()),
        TokenType::FloatLiteral => Value::Float(token.float_literal()),
        TokenType::BoolLiteral => Value::Bool(token.bool_literal()),
        other => panic!("internal error: literal expression with token type {:?}", other),
    }
}

/// Enforce a typed array declaration: the value must be an array whose
/// every element has the declared element type. Mixed arrays of uniform
/// element type coerce; anything else is refused.
fn coerce_to_declared_array(declared: RslTypeKind, value: Value) -> Result<Value, String> {
    let element_type = declared.element_type();
    match (&value, element_type) {
        (Value::StringArray(_), RslTypeKind::Str)
        | (Value::IntArray(_), RslTypeKind::Int)
        | (Value::FloatArray(_), RslTypeKind::Float)
        | (Value::BoolArray(_), RslTypeKind::Bool) => Ok(value),
        (Value::MixedArray(elements), _) => coerce_mixed(declared, element_type, elements),
        _ => Err(format!(
            "Expected {}, got {}",
            declared.display(),
            value.type_name()
        )),
    }
}

fn coerce_mixed(
    declared: RslTypeKind,
    element_type: RslTypeKind,
    elements: &[DynValue],
) -> Result<Value, String> {
    let mismatch = || {
        format!(
            "Cannot assign mixed array to {}: element types differ",
            declared.display()
        )
    };
    match element_type {
        RslTypeKind::Str => elements
            .iter()
            .map(|e| match e {
                DynValue::String(s) => Ok(s.clone()),
                _ => Err(mismatch()),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::StringArray),
        RslTypeKind::Int => elements
            .iter()
            .map(|e| match e {
                DynValue::Int(i) => Ok(*i),
                _ => Err(mismatch()),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::IntArray),
        RslTypeKind::Float => elements
            .iter()
            .map(|e| match e {
                DynValue::Float(f) => Ok(*f),
                _ => Err(mismatch()),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::FloatArray),
        RslTypeKind::Bool => elements
            .iter()
            .map(|e| match e {
                DynValue::Bool(b) => Ok(*b),
                _ => Err(mismatch()),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Value::BoolArray),
        _ => panic!("internal error: array element type is an array"),
    }
}

fn apply_unary(operator: &Token, value: Value) -> Result<Value, EvalError> {
    match (operator.lexeme.as_str(), value) {
        ("!", Value::Bool(b)) | ("not", Value::Bool(b)) => Ok(Value::Bool(!b)),
        ("-", Value::Int(n)) => Ok(Value::Int(-n)),
        ("-", Value::Float(n)) => Ok(Value::Float(-n)),
        ("+", Value::Int(n)) => Ok(Value::Int(n)),
        ("+", Value::Float(n)) => Ok(Value::Float(n)),
        (op, value) => Err(EvalError::type_error(
            operator,
            format!("Cannot apply unary '{}' to {}", op, value.type_name()),
        )),
    }
}

fn apply_binary(operator: &Token, left: Value, right: Value) -> Result<Value, EvalError> {
    match operator.token_type {
        TokenType::Plus => add_values(operator, left, right),
        TokenType::Minus | TokenType::Star | TokenType::Slash => {
            numeric_op(operator, left, right)
        }
        TokenType::EqualEqual => Ok(Value::Bool(left == right)),
        TokenType::NotEqual => Ok(Value::Bool(left != right)),
        TokenType::Less | TokenType::LessEqual | TokenType::Greater | TokenType::GreaterEqual => {
            compare_values(operator, left, right)
        }
        other => panic!("internal error: unhandled binary operator {:?}", other),
    }
}

fn add_values(operator: &Token, left: Value, right: Value) -> Result<Value, EvalError> {
    if left.is_array() {
        return join_arrays(operator, left, right);
    }
    match (left, right) {
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (Value::Int(a), Value::Float(b)) => Ok(Value::Float(a as f64 + b)),
        (Value::Float(a), Value::Int(b)) => Ok(Value::Float(a + b as f64)),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{}{}", a, b))),
        (a, b) => Err(EvalError::type_error(
            operator,
            format!("Cannot add {} and {}", a.type_name(), b.type_name()),
        )),
    }
}

/// `array + array` concatenates; `array + scalar` appends. Joining a typed
/// array with anything whose elements are not all of the declared element
/// type is refused.
fn join_arrays(operator: &Token, left: Value, right: Value) -> Result<Value, EvalError> {
    let join_mismatch = |l: &Value, r: &Value| {
        EvalError::type_error(
            operator,
            format!(
                "Cannot join two arrays of different types: {}, {}",
                l.type_name(),
                r.type_name()
            ),
        )
    };

    if let Value::MixedArray(mut elements) = left {
        match right.dyn_elements() {
            Some(more) => elements.extend(more),
            None => elements.push(DynValue::from_value(right)),
        }
        return Ok(Value::MixedArray(elements));
    }

    if right.is_array() {
        let joined = match (&left, &right) {
            (Value::StringArray(a), Value::StringArray(b)) => {
                Value::StringArray(a.iter().cloned().chain(b.iter().cloned()).collect())
            }
            (Value::IntArray(a), Value::IntArray(b)) => {
                Value::IntArray(a.iter().chain(b.iter()).copied().collect())
            }
            (Value::FloatArray(a), Value::FloatArray(b)) => {
                Value::FloatArray(a.iter().chain(b.iter()).copied().collect())
            }
            (Value::BoolArray(a), Value::BoolArray(b)) => {
                Value::BoolArray(a.iter().chain(b.iter()).copied().collect())
            }
            (typed, Value::MixedArray(elements)) => {
                append_uniform(typed, elements).ok_or_else(|| join_mismatch(&left, &right))?
            }
            _ => return Err(join_mismatch(&left, &right)),
        };
        return Ok(joined);
    }

    // array + scalar appends when the element type matches
    match (left, right) {
        (Value::StringArray(mut arr), Value::String(s)) => {
            arr.push(s);
            Ok(Value::StringArray(arr))
        }
        (Value::IntArray(mut arr), Value::Int(i)) => {
            arr.push(i);
            Ok(Value::IntArray(arr))
        }
        (Value::FloatArray(mut arr), Value::Float(f)) => {
            arr.push(f);
            Ok(Value::FloatArray(arr))
        }
        (Value::BoolArray(mut arr), Value::Bool(b)) => {
            arr.push(b);
            Ok(Value::BoolArray(arr))
        }
        (l, r) => Err(EvalError::type_error(
            operator,
            format!("Cannot append {} to {}", r.type_name(), l.type_name()),
        )),
    }
}

/// Append mixed elements onto a typed array if every element matches its
/// element type.
fn append_uniform(typed: &Value, elements: &[DynValue]) -> Option<Value> {
    match typed {
        Value::StringArray(arr) => {
            let mut out = arr.clone();
            for e in elements {
                match e {
                    DynValue::String(s) => out.push(s.clone()),
                    _ => return None,
                }
            }
            Some(Value::StringArray(out))
        }
        Value::IntArray(arr) => {
            let mut out = arr.clone();
            for e in elements {
                match e {
                    DynValue::Int(i) => out.push(*i),
                    _ => return None,
                }
            }
            Some(Value::IntArray(out))
        }
        Value::FloatArray(arr) => {
            let mut out = arr.clone();
            for e in elements {
                match e {
                    DynValue::Float(f) => out.push(*f),
                    _ => return None,
                }
            }
            Some(Value::FloatArray(out))
        }
        Value::BoolArray(arr) => {
            let mut out = arr.clone();
            for e in elements {
                match e {
                    DynValue::Bool(b) => out.push(*b),
                    _ => return None,
                }
            }
            Some(Value::BoolArray(out))
        }
        _ => None,
    }
}

fn numeric_op(operator: &Token, left: Value, right: Value) -> Result<Value, EvalError> {
    let fail = |l: &Value, r: &Value| {
        let verb = match operator.token_type {
            TokenType::Minus => format!("Cannot subtract {} from {}", r.type_name(), l.type_name()),
            TokenType::Star => format!("Cannot multiply {} by {}", l.type_name(), r.type_name()),
            _ => format!("Cannot divide {} by {}", l.type_name(), r.type_name()),
        };
        EvalError::type_error(operator, verb)
    };

    match (&left, &right) {
        (Value::Int(a), Value::Int(b)) => match operator.token_type {
            TokenType::Minus => Ok(Value::Int(a - b)),
            TokenType::Star => Ok(Value::Int(a * b)),
            _ => {
                if *b == 0 {
                    Err(EvalError::type_error(
                        operator,
                        "Division by zero".to_string(),
                    ))
                } else {
                    // int / int uses integer division
                    Ok(Value::Int(a / b))
                }
            }
        },
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let a = as_f64(&left);
            let b = as_f64(&right);
            match operator.token_type {
                TokenType::Minus => Ok(Value::Float(a - b)),
                TokenType::Star => Ok(Value::Float(a * b)),
                _ => {
                    if b == 0.0 {
                        Err(EvalError::type_error(
                            operator,
                            "Division by zero".to_string(),
                        ))
                    } else {
                        Ok(Value::Float(a / b))
                    }
                }
            }
        }
        (l, r) => Err(fail(l, r)),
    }
}

fn compare_values(operator: &Token, left: Value, right: Value) -> Result<Value, EvalError> {
    match (&left, &right) {
        (Value::Int(_) | Value::Float(_), Value::Int(_) | Value::Float(_)) => {
            let a = as_f64(&left);
            let b = as_f64(&right);
            let result = match operator.token_type {
                TokenType::Less => a < b,
                TokenType::LessEqual => a <= b,
                TokenType::Greater => a > b,
                _ => a >= b,
            };
            Ok(Value::Bool(result))
        }
        (l, r) => Err(EvalError::type_error(
            operator,
            format!(
                "Cannot compare {} {} {}",
                l.type_name(),
                operator.lexeme,
                r.type_name()
            ),
        )),
    }
}

fn as_f64(value: &Value) -> f64 {
    match value {
        Value::Int(n) => *n as f64,
        Value::Float(n) => *n,
        _ => panic!("internal error: as_f64 on non-numeric value"),
    }
}
