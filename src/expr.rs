//! Size and value expressions.
//!
//! Every expression can be asked whether it is concrete (computable without a
//! runtime instance), evaluated when it is, and reduced to a string: a decimal
//! literal when concrete, otherwise a formula in which field references are
//! accessed through a caller-supplied prefix such as `v.`.

use std::fmt;

use crate::error::Error;
use crate::ir::Stage;

/// Name of the integer coercion wrapped around field operands of arithmetic.
pub const INT_COERCION: &str = "int";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    And,
    Shl,
}

impl BinaryOp {
    pub fn parse(op: &str) -> Result<Self, Error> {
        match op {
            "+" => Ok(BinaryOp::Add),
            "-" => Ok(BinaryOp::Sub),
            "*" => Ok(BinaryOp::Mul),
            "/" => Ok(BinaryOp::Div),
            "&" | "&amp;" => Ok(BinaryOp::And),
            "<<" => Ok(BinaryOp::Shl),
            _ => Err(Error::InvalidOperator { op: op.to_string() }),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::And => "&",
            BinaryOp::Shl => "<<",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

impl UnaryOp {
    pub fn parse(op: &str) -> Result<Self, Error> {
        match op {
            "~" => Ok(UnaryOp::Not),
            _ => Err(Error::InvalidOperator { op: op.to_string() }),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            UnaryOp::Not => "~",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr<S: Stage> {
    Literal(i64),
    /// `1 << bit`, bit in 0..=31.
    Bit(u32),
    FieldRef(S::Name),
    EnumRef {
        ty: S::TypeRef,
        item: S::Name,
    },
    Unary {
        op: UnaryOp,
        expr: Box<Expr<S>>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr<S>>,
        rhs: Box<Expr<S>>,
    },
    /// Round up to a multiple of 4.
    Pad(Box<Expr<S>>),
    PopCount(Box<Expr<S>>),
    /// Sum over the elements of a list field.
    SumOf(S::Name),
    /// Named function applied to one argument (`len`, `int`, `FooListSize`).
    /// Evaluates to its argument when concrete.
    Call {
        func: String,
        arg: Box<Expr<S>>,
    },
}

/// Round `n` up to a multiple of 4.
pub fn pad(n: i64) -> i64 {
    n.wrapping_add(3) & !3
}

/// Number of set bits in the low 32 bits of `mask`.
pub fn popcount(mask: i64) -> u32 {
    (mask as u32).count_ones()
}

impl<S: Stage> Expr<S> {
    pub fn binary(op: BinaryOp, lhs: Expr<S>, rhs: Expr<S>) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn pad_of(expr: Expr<S>) -> Self {
        Expr::Pad(Box::new(expr))
    }

    pub fn popcount_of(expr: Expr<S>) -> Self {
        Expr::PopCount(Box::new(expr))
    }

    pub fn call(func: impl Into<String>, arg: Expr<S>) -> Self {
        Expr::Call {
            func: func.into(),
            arg: Box::new(arg),
        }
    }

    /// True iff the value can be computed without runtime field values.
    pub fn is_concrete(&self) -> bool {
        match self {
            Expr::Literal(_) | Expr::Bit(_) => true,
            Expr::FieldRef(_) | Expr::EnumRef { .. } | Expr::SumOf(_) => false,
            Expr::Unary { expr, .. } => expr.is_concrete(),
            Expr::Binary { lhs, rhs, .. } => lhs.is_concrete() && rhs.is_concrete(),
            Expr::Pad(e) | Expr::PopCount(e) => e.is_concrete(),
            Expr::Call { arg, .. } => arg.is_concrete(),
        }
    }

    /// Constant value of a concrete expression.
    pub fn eval(&self) -> Result<i64, Error> {
        match self {
            Expr::Literal(v) => Ok(*v),
            Expr::Bit(b) => Ok(1i64 << b),
            Expr::FieldRef(_) | Expr::EnumRef { .. } | Expr::SumOf(_) => {
                Err(Error::NotConcrete {
                    expr: self.reduce(""),
                })
            }
            Expr::Unary { op, expr } => {
                let v = expr.eval()?;
                Ok(match op {
                    UnaryOp::Not => !v,
                })
            }
            Expr::Binary { op, lhs, rhs } => {
                let (a, b) = (lhs.eval()?, rhs.eval()?);
                Ok(match op {
                    BinaryOp::Add => a.wrapping_add(b),
                    BinaryOp::Sub => a.wrapping_sub(b),
                    BinaryOp::Mul => a.wrapping_mul(b),
                    BinaryOp::Div => {
                        if b == 0 {
                            return Err(Error::DivideByZero {
                                expr: self.reduce(""),
                            });
                        }
                        a.wrapping_div(b)
                    }
                    BinaryOp::And => a & b,
                    BinaryOp::Shl => {
                        if (0..64).contains(&b) {
                            ((a as u64) << b) as i64
                        } else {
                            0
                        }
                    }
                })
            }
            Expr::Pad(e) => Ok(pad(e.eval()?)),
            Expr::PopCount(e) => Ok(popcount(e.eval()?) as i64),
            Expr::Call { arg, .. } => arg.eval(),
        }
    }

    /// Render as a literal (concrete) or as a formula with fields read through `prefix`.
    pub fn reduce(&self, prefix: &str) -> String {
        if self.is_concrete() {
            if let Ok(v) = self.eval() {
                return v.to_string();
            }
        }
        match self {
            Expr::Literal(v) => v.to_string(),
            Expr::Bit(b) => (1i64 << b).to_string(),
            Expr::FieldRef(name) => format!("{}{}", prefix, S::display_name(name)),
            Expr::EnumRef { ty, item } => {
                format!("{}::{}", S::display_ref(ty), S::display_name(item))
            }
            Expr::Unary { op, expr } => format!("({}({}))", op.symbol(), expr.reduce(prefix)),
            Expr::Binary { op, lhs, rhs } => format!(
                "({} {} {})",
                coerced(lhs, prefix),
                op.symbol(),
                coerced(rhs, prefix)
            ),
            Expr::Pad(e) => format!("pad({})", e.reduce(prefix)),
            Expr::PopCount(e) => format!("popcount({})", e.reduce(prefix)),
            Expr::SumOf(name) => format!("sum({}{})", prefix, S::display_name(name)),
            Expr::Call { func, arg } => format!("{}({})", func, arg.reduce(prefix)),
        }
    }
}

/// Field operands of arithmetic are viewed as integers so enum, bool and
/// integer fields combine.
fn coerced<S: Stage>(e: &Expr<S>, prefix: &str) -> String {
    match e {
        Expr::FieldRef(_) => format!("{}({})", INT_COERCION, e.reduce(prefix)),
        _ => e.reduce(prefix),
    }
}

impl<S: Stage> fmt::Display for Expr<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reduce(""))
    }
}
