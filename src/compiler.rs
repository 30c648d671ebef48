// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Expression-to-SQL compiler.
//!
//! A pure tree walk over [`Expr`]: the compiler holds only borrowed
//! collaborators and writes into the caller's [`SqlBuffer`], so one
//! instance can be reused for any number of expressions.
//!
//! # Rendering rules
//!
//! | Input | SQL |
//! |-------|-----|
//! | `x == null`, `x != null` | `x IS NULL`, `x IS NOT NULL` |
//! | bare boolean column as predicate | `col=TRUE` |
//! | `!column` | `col=FALSE` |
//! | `!constant` | folded constant |
//! | `!(x IN ..)`, `!(x IS NULL)`, `!(x LIKE ..)` | `NOT IN`, `IS NOT NULL`, `NOT LIKE` |
//! | `!(a > b)` and other comparisons | opposite comparison, `a<=b` |
//! | nested `AND`/`OR` operand | parenthesized |
//! | arithmetic/comparison child of lower precedence | parenthesized |
//! | `coalesce` | `COALESCE(l, r)` |
//! | `cast` | `CAST(x AS <dialect type>)` |
//!
//! Constants become bound parameters (`p0`, `p1`, ...) unless the compiler
//! is switched to [`ParameterMode::Inline`], where they are escaped through
//! the dialect instead.

#[cfg(test)]
mod tests;

use crate::{
    dialect::SqlHelper,
    entity::EntityType,
    error::{Error, Result},
    expr::{BinaryOp, ColumnRef, Expr, UnaryOp},
    sql::SqlBuffer,
    value::Value
};

/// Resolves column owners to tables and qualifiers.
pub trait AliasResolver {
    /// Entity type owning columns of `entity` (`None` is the primary type).
    fn entity_type(&self, entity: Option<&'static str>) -> Result<&'static EntityType>;

    /// Qualifier written in front of columns of `entity`.
    fn qualifier(&self, entity: Option<&'static str>) -> Result<Option<String>>;
}

/// Resolver for single-table statements: every column belongs to one type
/// and is written unqualified.
#[derive(Debug, Clone, Copy)]
pub struct TableScope(pub &'static EntityType);

impl AliasResolver for TableScope {
    fn entity_type(&self, entity: Option<&'static str>) -> Result<&'static EntityType> {
        match entity {
            None => Ok(self.0),
            Some(name) if name == self.0.name() => Ok(self.0),
            Some(name) => Err(Error::translation(format!(
                "column of `{name}` used in a statement over `{}`",
                self.0.name()
            )))
        }
    }

    fn qualifier(&self, _entity: Option<&'static str>) -> Result<Option<String>> {
        Ok(None)
    }
}

/// How constants are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ParameterMode {
    /// Bind every constant as a named parameter.
    #[default]
    Bind,
    /// Escape constants as literals.
    Inline
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Context {
    Predicate,
    Value
}

const ATOM: u8 = 10;
const NEGATE: u8 = 7;
const COMPARISON: u8 = 4;
const NOT: u8 = 3;

/// Expression compiler.
#[derive(Clone, Copy)]
pub struct ExpressionCompiler<'a> {
    dialect:  &'a dyn SqlHelper,
    resolver: &'a dyn AliasResolver,
    mode:     ParameterMode
}

impl<'a> ExpressionCompiler<'a> {
    /// Create a compiler binding constants as parameters.
    pub fn new(dialect: &'a dyn SqlHelper, resolver: &'a dyn AliasResolver) -> Self {
        Self {
            dialect,
            resolver,
            mode: ParameterMode::Bind
        }
    }

    /// Switch constant handling.
    pub const fn with_mode(mut self, mode: ParameterMode) -> Self {
        self.mode = mode;
        self
    }

    /// Compile a boolean predicate (WHERE, ON, CASE test).
    pub fn predicate(&self, expr: &Expr, buf: &mut SqlBuffer) -> Result<()> {
        self.visit(expr, Context::Predicate, buf)
    }

    /// Compile a value or selector (SET right-hand side, projections).
    pub fn value(&self, expr: &Expr, buf: &mut SqlBuffer) -> Result<()> {
        self.visit(expr, Context::Value, buf)
    }

    /// Compile a predicate into a standalone fragment.
    pub fn predicate_fragment(&self, expr: &Expr, buf: &mut SqlBuffer) -> Result<String> {
        let start = buf.text().len();
        self.predicate(expr, buf)?;
        Ok(buf.text()[start..].to_string())
    }

    /// Qualified, quoted column name.
    pub fn column(&self, column: &ColumnRef) -> Result<String> {
        let ty = self.resolver.entity_type(column.entity)?;
        let property = ty.property(&column.property)?;
        let qualifier = self.resolver.qualifier(column.entity)?;
        Ok(self.dialect.qualify(property.column(), qualifier.as_deref()))
    }

    fn visit(&self, expr: &Expr, ctx: Context, buf: &mut SqlBuffer) -> Result<()> {
        match expr {
            Expr::Column(column) => {
                buf.push(&self.column(column)?);
                if ctx == Context::Predicate {
                    self.push_truth(true, buf);
                }
                Ok(())
            }
            Expr::Constant(value) => self.constant(value, ctx, buf),
            Expr::Raw(sql) => {
                buf.push(sql);
                Ok(())
            }
            Expr::Binary {
                op,
                left,
                right
            } => self.binary(*op, left, right, ctx, buf),
            Expr::Unary {
                op: UnaryOp::Not,
                operand
            } => self.not(operand, buf),
            Expr::Unary {
                op: UnaryOp::Negate,
                operand
            } => {
                self.require_value(expr, ctx)?;
                buf.push_char('-');
                self.operand(operand, NEGATE, false, buf)
            }
            Expr::Coalesce {
                left,
                right
            } => {
                buf.push("COALESCE(");
                self.value(left, buf)?;
                buf.push(", ");
                self.value(right, buf)?;
                buf.push_char(')');
                self.close_predicate(ctx, buf);
                Ok(())
            }
            Expr::Conditional {
                test,
                if_true,
                if_false
            } => {
                if ctx == Context::Predicate {
                    buf.push_char('(');
                }
                buf.push("CASE WHEN ");
                self.predicate(test, buf)?;
                buf.push(" THEN ");
                self.value(if_true, buf)?;
                buf.push(" ELSE ");
                self.value(if_false, buf)?;
                buf.push(" END");
                if ctx == Context::Predicate {
                    buf.push_char(')');
                    self.push_truth(true, buf);
                }
                Ok(())
            }
            Expr::IsNull {
                operand,
                negated
            } => self.is_null(operand, *negated, buf),
            Expr::In {
                operand,
                values,
                negated
            } => self.in_list(operand, values, *negated, buf),
            Expr::Like {
                operand,
                pattern,
                negated
            } => {
                self.operand(operand, COMPARISON, false, buf)?;
                buf.push(if *negated { " NOT LIKE " } else { " LIKE " });
                self.operand(pattern, COMPARISON, true, buf)?;
                buf.push(self.dialect.like_escape());
                Ok(())
            }
            Expr::Cast {
                operand,
                target
            } => {
                let type_name = self.dialect.type_name(*target).ok_or_else(|| {
                    Error::configuration(format!(
                        "no SQL type mapped for CAST target `{}`",
                        target.name()
                    ))
                })?;
                buf.push("CAST(");
                self.value(operand, buf)?;
                buf.push(" AS ").push(type_name).push_char(')');
                self.close_predicate(ctx, buf);
                Ok(())
            }
            Expr::Function {
                name,
                args
            } => {
                if name.is_empty() {
                    return Err(Error::argument("name", "function name must not be empty"));
                }
                self.call(name, args, buf)?;
                self.close_predicate(ctx, buf);
                Ok(())
            }
            Expr::Method {
                target,
                method,
                args
            } => {
                let lowered = self.lower_method(target, method, args)?;
                self.visit(&lowered, ctx, buf)
            }
        }
    }

    fn constant(&self, value: &Value, ctx: Context, buf: &mut SqlBuffer) -> Result<()> {
        match (ctx, value) {
            (Context::Predicate, Value::Bool(true)) => {
                buf.push("1=1");
            }
            (Context::Predicate, Value::Bool(false)) => {
                buf.push("1=0");
            }
            (Context::Predicate, other) => {
                return Err(Error::translation(format!(
                    "constant {} is not a predicate",
                    other.describe()
                )));
            }
            (Context::Value, Value::Null) => {
                buf.push("NULL");
            }
            (Context::Value, value) => match self.mode {
                ParameterMode::Bind => {
                    let name = buf.bind_next(value.clone());
                    buf.push(&self.dialect.parameter(&name));
                }
                ParameterMode::Inline => {
                    buf.push(&self.dialect.escape(&value.clone().widen())?);
                }
            }
        }
        Ok(())
    }

    fn binary(
        &self,
        op: BinaryOp,
        left: &Expr,
        right: &Expr,
        ctx: Context,
        buf: &mut SqlBuffer
    ) -> Result<()> {
        if op.is_logical() {
            self.logical_operand(left, buf)?;
            buf.push(op.as_sql());
            return self.logical_operand(right, buf);
        }

        if matches!(op, BinaryOp::Equal | BinaryOp::NotEqual) {
            let negated = op == BinaryOp::NotEqual;
            if right.is_null_constant() {
                return self.is_null(left, negated, buf);
            }
            if left.is_null_constant() {
                return self.is_null(right, negated, buf);
            }
        }

        if !op.is_comparison() {
            self.require_value_op(op, ctx)?;
        }
        let precedence = op.precedence();
        self.operand(left, precedence, false, buf)?;
        buf.push(op.as_sql());
        self.operand(right, precedence, true, buf)
    }

    fn logical_operand(&self, operand: &Expr, buf: &mut SqlBuffer) -> Result<()> {
        let nested = match operand {
            Expr::Binary {
                op, ..
            } => op.is_logical(),
            Expr::Raw(_) => true,
            _ => false
        };
        if nested {
            buf.push_char('(');
            self.predicate(operand, buf)?;
            buf.push_char(')');
            Ok(())
        } else {
            self.predicate(operand, buf)
        }
    }

    /// Write a value operand, parenthesized when it binds looser than its
    /// parent. Right operands also group on equal precedence. An operand
    /// starting with `-` is grouped after a `-` so the text never holds `--`.
    fn operand(
        &self,
        operand: &Expr,
        parent: u8,
        right_side: bool,
        buf: &mut SqlBuffer
    ) -> Result<()> {
        let own = precedence(operand);
        let wrap = own < parent
            || (right_side && own == parent && own != ATOM)
            || (buf.text().ends_with('-') && self.leads_with_minus(operand));
        if wrap {
            buf.push_char('(');
        }
        self.value(operand, buf)?;
        if wrap {
            buf.push_char(')');
        }
        Ok(())
    }

    fn leads_with_minus(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Unary {
                op: UnaryOp::Negate,
                ..
            } => true,
            Expr::Binary {
                op,
                left,
                ..
            } if !op.is_logical() => self.leads_with_minus(left),
            Expr::Constant(value) => {
                self.mode == ParameterMode::Inline && value.is_negative()
            }
            Expr::Raw(sql) => sql.trim_start().starts_with('-'),
            _ => false
        }
    }

    fn not(&self, operand: &Expr, buf: &mut SqlBuffer) -> Result<()> {
        match operand {
            Expr::Column(column) => {
                buf.push(&self.column(column)?);
                self.push_truth(false, buf);
                Ok(())
            }
            Expr::Constant(Value::Bool(b)) => {
                self.constant(&Value::Bool(!b), Context::Predicate, buf)
            }
            Expr::Unary {
                op: UnaryOp::Not,
                operand
            } => self.predicate(operand, buf),
            Expr::IsNull {
                operand,
                negated
            } => self.is_null(operand, !negated, buf),
            Expr::In {
                operand,
                values,
                negated
            } => self.in_list(operand, values, !negated, buf),
            Expr::Like {
                operand,
                pattern,
                negated
            } => self.visit(
                &Expr::Like {
                    operand: operand.clone(),
                    pattern: pattern.clone(),
                    negated: !negated
                },
                Context::Predicate,
                buf
            ),
            Expr::Method {
                target,
                method,
                args
            } => {
                let lowered = self.lower_method(target, method, args)?;
                self.not(&lowered, buf)
            }
            Expr::Binary {
                op,
                left,
                right
            } if matches!(op, BinaryOp::Equal | BinaryOp::NotEqual)
                && (left.is_null_constant() || right.is_null_constant()) =>
            {
                let negated = *op == BinaryOp::Equal;
                let tested = if right.is_null_constant() { left } else { right };
                self.is_null(tested, negated, buf)
            }
            other => {
                if let Expr::Binary {
                    op,
                    left,
                    right
                } = other
                    && let Some(flipped) = op.negated()
                {
                    return self.binary(flipped, left, right, Context::Predicate, buf);
                }
                buf.push("NOT (");
                self.predicate(other, buf)?;
                buf.push_char(')');
                Ok(())
            }
        }
    }

    fn is_null(&self, operand: &Expr, negated: bool, buf: &mut SqlBuffer) -> Result<()> {
        if operand.is_null_constant() {
            buf.push(if negated { "1=0" } else { "1=1" });
            return Ok(());
        }
        self.operand(operand, COMPARISON, false, buf)?;
        buf.push(if negated { " IS NOT NULL" } else { " IS NULL" });
        Ok(())
    }

    fn in_list(
        &self,
        operand: &Expr,
        values: &[Expr],
        negated: bool,
        buf: &mut SqlBuffer
    ) -> Result<()> {
        if values.is_empty() {
            return Err(Error::argument("values", "IN requires at least one value"));
        }
        self.operand(operand, COMPARISON, false, buf)?;
        buf.push(if negated { " NOT IN (" } else { " IN (" });
        for (i, value) in values.iter().enumerate() {
            if i > 0 {
                buf.push(", ");
            }
            self.value(value, buf)?;
        }
        buf.push_char(')');
        Ok(())
    }

    fn call(&self, name: &str, args: &[Expr], buf: &mut SqlBuffer) -> Result<()> {
        buf.push(name).push_char('(');
        for (i, arg) in args.iter().enumerate() {
            if i > 0 {
                buf.push(", ");
            }
            self.value(arg, buf)?;
        }
        buf.push_char(')');
        Ok(())
    }

    /// Map a method call onto a SQL-specific node.
    fn lower_method(&self, target: &Expr, method: &str, args: &[Expr]) -> Result<Expr> {
        let arity = |n: usize| -> Result<()> {
            if args.len() == n {
                Ok(())
            } else {
                Err(Error::translation(format!(
                    "`{method}` takes {n} argument(s), got {}",
                    args.len()
                )))
            }
        };
        let function = |name: &str| Expr::Function {
            name: name.to_string(),
            args: vec![target.clone()]
        };

        match method {
            "Contains" | "StartsWith" | "EndsWith" => {
                arity(1)?;
                let Expr::Constant(Value::String(text)) = &args[0] else {
                    return Err(Error::translation(format!(
                        "`{method}` needs a constant string argument"
                    )));
                };
                let escaped = escape_like(text);
                let pattern = match method {
                    "Contains" => format!("%{escaped}%"),
                    "StartsWith" => format!("{escaped}%"),
                    _ => format!("%{escaped}")
                };
                Ok(Expr::Like {
                    operand: Box::new(target.clone()),
                    pattern: Box::new(Expr::Constant(Value::String(pattern))),
                    negated: false
                })
            }
            "ToUpper" => arity(0).map(|()| function("UPPER")),
            "ToLower" => arity(0).map(|()| function("LOWER")),
            "Trim" => arity(0).map(|()| function("TRIM")),
            "Length" => arity(0).map(|()| function(self.dialect.length_function())),
            "Equals" => {
                arity(1)?;
                Ok(target.clone().eq(args[0].clone()))
            }
            other => Err(Error::translation(format!(
                "method `{other}` has no SQL translation"
            )))
        }
    }

    fn push_truth(&self, value: bool, buf: &mut SqlBuffer) {
        buf.push_char('=').push(self.dialect.boolean(value));
    }

    fn close_predicate(&self, ctx: Context, buf: &mut SqlBuffer) {
        if ctx == Context::Predicate {
            self.push_truth(true, buf);
        }
    }

    fn require_value(&self, expr: &Expr, ctx: Context) -> Result<()> {
        if ctx == Context::Predicate {
            return Err(Error::translation(format!(
                "expression {expr:?} is not a predicate"
            )));
        }
        Ok(())
    }

    fn require_value_op(&self, op: BinaryOp, ctx: Context) -> Result<()> {
        if ctx == Context::Predicate {
            return Err(Error::translation(format!(
                "arithmetic `{}` is not a predicate",
                op.as_sql()
            )));
        }
        Ok(())
    }
}

fn precedence(expr: &Expr) -> u8 {
    match expr {
        Expr::Binary {
            op, ..
        } => op.precedence(),
        Expr::Unary {
            op: UnaryOp::Not, ..
        } => NOT,
        Expr::Unary {
            op: UnaryOp::Negate,
            ..
        } => NEGATE,
        Expr::IsNull {
            ..
        }
        | Expr::In {
            ..
        }
        | Expr::Like {
            ..
        } => COMPARISON,
        Expr::Raw(_) => 0,
        _ => ATOM
    }
}

/// Escape LIKE wildcards with a backslash.
pub fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
