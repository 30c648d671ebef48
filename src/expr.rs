// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Predicate and selector expressions.
//!
//! Expressions are a closed tree. Columns are the only nodes rooted in a
//! query parameter; everything computed from Rust values is already a
//! [`Expr::Constant`] by the time the tree is built.
//!
//! # Building
//!
//! ```rust
//! use entity_data::expr::{col, null, val};
//!
//! let visible = col("Published").and(col("Name").ne(null()));
//! let bump = col("ViewCount") + 1;
//! let recent = col("Id").gt(val(100)).or(col("Title").contains("rust"));
//! ```
//!
//! Columns written with [`col`] belong to the query's primary type.
//! Columns of joined types are written with [`field`].

use std::ops;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    entity::Entity,
    value::{Value, ValueKind}
};

/// Column reference rooted in a query parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    /// Owning type identity; `None` is the primary type of the statement.
    pub entity:   Option<&'static str>,
    /// Model-side property name.
    pub property: String
}

/// Binary operators, in precedence table order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Subtract,
    /// `*`
    Multiply,
    /// `/`
    Divide,
    /// `%`
    Modulo,
    /// `=`
    Equal,
    /// `<>`
    NotEqual,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanOrEqual,
    /// `<`
    LessThan,
    /// `<=`
    LessThanOrEqual,
    /// `AND`
    And,
    /// `OR`
    Or
}

impl BinaryOp {
    /// SQL token.
    pub const fn as_sql(&self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Subtract => "-",
            Self::Multiply => "*",
            Self::Divide => "/",
            Self::Modulo => "%",
            Self::Equal => "=",
            Self::NotEqual => "<>",
            Self::GreaterThan => ">",
            Self::GreaterThanOrEqual => ">=",
            Self::LessThan => "<",
            Self::LessThanOrEqual => "<=",
            Self::And => " AND ",
            Self::Or => " OR "
        }
    }

    /// Binding strength; higher binds tighter.
    pub const fn precedence(&self) -> u8 {
        match self {
            Self::Multiply | Self::Divide | Self::Modulo => 6,
            Self::Add | Self::Subtract => 5,
            Self::Equal
            | Self::NotEqual
            | Self::GreaterThan
            | Self::GreaterThanOrEqual
            | Self::LessThan
            | Self::LessThanOrEqual => 4,
            Self::And => 2,
            Self::Or => 1
        }
    }

    /// Check if this is `AND` or `OR`.
    pub const fn is_logical(&self) -> bool {
        matches!(self, Self::And | Self::Or)
    }

    /// Check if this is a comparison.
    pub const fn is_comparison(&self) -> bool {
        self.precedence() == 4
    }

    /// Comparison with the opposite outcome, if any.
    pub const fn negated(&self) -> Option<Self> {
        match self {
            Self::Equal => Some(Self::NotEqual),
            Self::NotEqual => Some(Self::Equal),
            Self::GreaterThan => Some(Self::LessThanOrEqual),
            Self::GreaterThanOrEqual => Some(Self::LessThan),
            Self::LessThan => Some(Self::GreaterThanOrEqual),
            Self::LessThanOrEqual => Some(Self::GreaterThan),
            _ => None
        }
    }
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    /// Logical negation.
    Not,
    /// Arithmetic negation.
    Negate
}

/// Expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Column of a query parameter.
    Column(ColumnRef),
    /// Already-evaluated value.
    Constant(Value),
    /// Binary operation.
    Binary {
        /// Operator.
        op:    BinaryOp,
        /// Left operand.
        left:  Box<Expr>,
        /// Right operand.
        right: Box<Expr>
    },
    /// Unary operation.
    Unary {
        /// Operator.
        op:      UnaryOp,
        /// Operand.
        operand: Box<Expr>
    },
    /// `COALESCE(left, right)`.
    Coalesce {
        /// First choice.
        left:  Box<Expr>,
        /// Fallback.
        right: Box<Expr>
    },
    /// `CASE WHEN test THEN if_true ELSE if_false END`.
    Conditional {
        /// Condition.
        test:     Box<Expr>,
        /// Value when true.
        if_true:  Box<Expr>,
        /// Value otherwise.
        if_false: Box<Expr>
    },
    /// `IS [NOT] NULL`.
    IsNull {
        /// Tested expression.
        operand: Box<Expr>,
        /// `IS NOT NULL` when set.
        negated: bool
    },
    /// `[NOT] IN (...)`.
    In {
        /// Tested expression.
        operand: Box<Expr>,
        /// Candidate values.
        values:  Vec<Expr>,
        /// `NOT IN` when set.
        negated: bool
    },
    /// `[NOT] LIKE pattern`.
    Like {
        /// Tested expression.
        operand: Box<Expr>,
        /// Pattern expression.
        pattern: Box<Expr>,
        /// `NOT LIKE` when set.
        negated: bool
    },
    /// `CAST(operand AS type)`.
    Cast {
        /// Converted expression.
        operand: Box<Expr>,
        /// Target kind, mapped through the dialect.
        target:  ValueKind
    },
    /// Named SQL function call, rendered verbatim.
    Function {
        /// Function name.
        name: String,
        /// Arguments.
        args: Vec<Expr>
    },
    /// Method call on a value, e.g. `Contains`, `ToUpper`.
    Method {
        /// Receiver.
        target: Box<Expr>,
        /// Method name.
        method: String,
        /// Arguments.
        args:   Vec<Expr>
    },
    /// Raw SQL fragment, copied verbatim.
    Raw(String)
}

/// Column of the primary type.
pub fn col(property: impl Into<String>) -> Expr {
    Expr::Column(ColumnRef {
        entity:   None,
        property: property.into()
    })
}

/// Column of a specific entity type.
pub fn field<T: Entity>(property: impl Into<String>) -> Expr {
    Expr::Column(ColumnRef {
        entity:   Some(T::entity_type().name()),
        property: property.into()
    })
}

/// Constant value.
pub fn val(value: impl Into<Value>) -> Expr {
    Expr::Constant(value.into())
}

/// NULL literal.
pub const fn null() -> Expr {
    Expr::Constant(Value::Null)
}

/// Raw SQL fragment.
pub fn raw(sql: impl Into<String>) -> Expr {
    Expr::Raw(sql.into())
}

/// SQL function call.
pub fn func(name: impl Into<String>, args: Vec<Expr>) -> Expr {
    Expr::Function {
        name: name.into(),
        args
    }
}

/// `CASE WHEN test THEN if_true ELSE if_false END`.
pub fn case(test: Expr, if_true: impl Into<Expr>, if_false: impl Into<Expr>) -> Expr {
    Expr::Conditional {
        test:     Box::new(test),
        if_true:  Box::new(if_true.into()),
        if_false: Box::new(if_false.into())
    }
}

impl Expr {
    fn binary(self, op: BinaryOp, right: impl Into<Expr>) -> Self {
        Self::Binary {
            op,
            left: Box::new(self),
            right: Box::new(right.into())
        }
    }

    fn method(self, method: &str, args: Vec<Expr>) -> Self {
        Self::Method {
            target: Box::new(self),
            method: method.to_string(),
            args
        }
    }

    /// `self = other`
    pub fn eq(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Equal, other)
    }

    /// `self <> other`
    pub fn ne(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::NotEqual, other)
    }

    /// `self > other`
    pub fn gt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::GreaterThan, other)
    }

    /// `self >= other`
    pub fn ge(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::GreaterThanOrEqual, other)
    }

    /// `self < other`
    pub fn lt(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::LessThan, other)
    }

    /// `self <= other`
    pub fn le(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::LessThanOrEqual, other)
    }

    /// `self AND other`
    pub fn and(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::And, other)
    }

    /// `self OR other`
    pub fn or(self, other: impl Into<Expr>) -> Self {
        self.binary(BinaryOp::Or, other)
    }

    /// `self IS NULL`
    pub fn is_null(self) -> Self {
        Self::IsNull {
            operand: Box::new(self),
            negated: false
        }
    }

    /// `self IS NOT NULL`
    pub fn is_not_null(self) -> Self {
        Self::IsNull {
            operand: Box::new(self),
            negated: true
        }
    }

    /// `self IN (values)`
    pub fn is_in<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Expr>
    {
        Self::In {
            operand: Box::new(self),
            values:  values.into_iter().map(Into::into).collect(),
            negated: false
        }
    }

    /// `self NOT IN (values)`
    pub fn not_in<I, V>(self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Expr>
    {
        Self::In {
            operand: Box::new(self),
            values:  values.into_iter().map(Into::into).collect(),
            negated: true
        }
    }

    /// `self LIKE pattern`, pattern used as written.
    pub fn like(self, pattern: impl Into<Expr>) -> Self {
        Self::Like {
            operand: Box::new(self),
            pattern: Box::new(pattern.into()),
            negated: false
        }
    }

    /// `self NOT LIKE pattern`
    pub fn not_like(self, pattern: impl Into<Expr>) -> Self {
        Self::Like {
            operand: Box::new(self),
            pattern: Box::new(pattern.into()),
            negated: true
        }
    }

    /// Substring match; wildcards in the argument are escaped.
    pub fn contains(self, value: impl Into<Expr>) -> Self {
        self.method("Contains", vec![value.into()])
    }

    /// Prefix match.
    pub fn starts_with(self, value: impl Into<Expr>) -> Self {
        self.method("StartsWith", vec![value.into()])
    }

    /// Suffix match.
    pub fn ends_with(self, value: impl Into<Expr>) -> Self {
        self.method("EndsWith", vec![value.into()])
    }

    /// `UPPER(self)`
    pub fn to_upper(self) -> Self {
        self.method("ToUpper", Vec::new())
    }

    /// `LOWER(self)`
    pub fn to_lower(self) -> Self {
        self.method("ToLower", Vec::new())
    }

    /// `TRIM(self)`
    pub fn trim(self) -> Self {
        self.method("Trim", Vec::new())
    }

    /// String length, through the dialect's length function.
    pub fn length(self) -> Self {
        self.method("Length", Vec::new())
    }

    /// Arbitrary method call, resolved by the compiler.
    pub fn call(self, method: &str, args: Vec<Expr>) -> Self {
        self.method(method, args)
    }

    /// `COALESCE(self, fallback)`
    pub fn coalesce(self, fallback: impl Into<Expr>) -> Self {
        Self::Coalesce {
            left:  Box::new(self),
            right: Box::new(fallback.into())
        }
    }

    /// `CAST(self AS target)`
    pub fn cast(self, target: ValueKind) -> Self {
        Self::Cast {
            operand: Box::new(self),
            target
        }
    }

    /// Logical negation.
    pub fn not(self) -> Self {
        Self::Unary {
            op:      UnaryOp::Not,
            operand: Box::new(self)
        }
    }

    /// Check if this is a NULL constant.
    pub const fn is_null_constant(&self) -> bool {
        matches!(self, Self::Constant(Value::Null))
    }
}

macro_rules! expr_from_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl From<$ty> for Expr {
                fn from(v: $ty) -> Self {
                    Self::Constant(v.into())
                }
            }
        )*
    };
}

expr_from_value!(
    bool,
    i16,
    i32,
    i64,
    u8,
    u16,
    u32,
    f32,
    f64,
    String,
    &str,
    Vec<u8>,
    Uuid,
    DateTime<Utc>,
    Value
);

impl<T: Into<Value>> From<Option<T>> for Expr {
    fn from(v: Option<T>) -> Self {
        Self::Constant(v.into())
    }
}

macro_rules! arithmetic {
    ($($trait:ident :: $method:ident => $op:ident),*) => {
        $(
            impl<R: Into<Expr>> ops::$trait<R> for Expr {
                type Output = Expr;

                fn $method(self, rhs: R) -> Expr {
                    self.binary(BinaryOp::$op, rhs)
                }
            }
        )*
    };
}

arithmetic!(
    Add::add => Add,
    Sub::sub => Subtract,
    Mul::mul => Multiply,
    Div::div => Divide,
    Rem::rem => Modulo,
    BitAnd::bitand => And,
    BitOr::bitor => Or
);

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::not(self)
    }
}

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Unary {
            op:      UnaryOp::Negate,
            operand: Box::new(self)
        }
    }
}
