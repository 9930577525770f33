mod binary;
mod column;
mod literal;
pub mod utils;

pub use binary::{BinaryExpr, BinaryOp};
pub use column::ColumnExpr;
pub use literal::Literal;

use crate::catalog::{Column, DataType, Schema};
use crate::error::HashFileResult;
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;

pub trait ExprTrait {
    /// Get the data type of this expression, given the schema of the input
    fn data_type(&self, input_schema: &Schema) -> HashFileResult<DataType>;

    /// Determine whether this expression is nullable, given the schema of the input
    fn nullable(&self, input_schema: &Schema) -> HashFileResult<bool>;

    /// Evaluate an expression against a Tuple
    fn evaluate(&self, tuple: &Tuple) -> HashFileResult<ScalarValue>;

    /// convert to a column with respect to a schema
    fn to_column(&self, input_schema: &Schema) -> HashFileResult<Column>;
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Expr {
    /// A named reference to a qualified filed in a schema.
    Column(ColumnExpr),
    /// A constant value.
    Literal(Literal),
    /// A binary expression such as "age > 21"
    Binary(BinaryExpr),
}

impl Expr {
    pub fn column(name: impl Into<String>) -> Self {
        Expr::Column(ColumnExpr { name: name.into() })
    }

    pub fn literal(value: impl Into<ScalarValue>) -> Self {
        Expr::Literal(Literal {
            value: value.into(),
        })
    }

    pub fn binary(left: Expr, op: BinaryOp, right: Expr) -> Self {
        Expr::Binary(BinaryExpr {
            left: Box::new(left),
            op,
            right: Box::new(right),
        })
    }

    pub fn eq(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Eq, other)
    }

    pub fn gt(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Gt, other)
    }

    pub fn lt(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Lt, other)
    }

    pub fn and(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::And, other)
    }

    pub fn or(self, other: Expr) -> Self {
        Self::binary(self, BinaryOp::Or, other)
    }
}

impl ExprTrait for Expr {
    fn data_type(&self, input_schema: &Schema) -> HashFileResult<DataType> {
        match self {
            Expr::Column(column) => column.data_type(input_schema),
            Expr::Literal(literal) => literal.data_type(input_schema),
            Expr::Binary(binary) => binary.data_type(input_schema),
        }
    }

    fn nullable(&self, input_schema: &Schema) -> HashFileResult<bool> {
        match self {
            Expr::Column(column) => column.nullable(input_schema),
            Expr::Literal(literal) => literal.nullable(input_schema),
            Expr::Binary(binary) => binary.nullable(input_schema),
        }
    }

    fn evaluate(&self, tuple: &Tuple) -> HashFileResult<ScalarValue> {
        match self {
            Expr::Column(column) => column.evaluate(tuple),
            Expr::Literal(literal) => literal.evaluate(tuple),
            Expr::Binary(binary) => binary.evaluate(tuple),
        }
    }

    fn to_column(&self, input_schema: &Schema) -> HashFileResult<Column> {
        match self {
            Expr::Column(column) => column.to_column(input_schema),
            Expr::Literal(literal) => literal.to_column(input_schema),
            Expr::Binary(binary) => binary.to_column(input_schema),
        }
    }
}

impl std::fmt::Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Expr::Column(e) => write!(f, "{e}"),
            Expr::Literal(e) => write!(f, "{e}"),
            Expr::Binary(e) => write!(f, "{e}"),
        }
    }
}
