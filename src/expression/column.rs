use crate::catalog::Schema;
use crate::catalog::{Column, DataType};
use crate::error::HashFileResult;
use crate::expression::ExprTrait;
use crate::storage::tuple::Tuple;
use crate::utils::scalar::ScalarValue;

/// A reference to a column of the input schema by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnExpr {
    pub name: String,
}

impl ExprTrait for ColumnExpr {
    fn data_type(&self, input_schema: &Schema) -> HashFileResult<DataType> {
        Ok(input_schema.column_with_name(&self.name)?.data_type)
    }

    fn nullable(&self, input_schema: &Schema) -> HashFileResult<bool> {
        Ok(input_schema.column_with_name(&self.name)?.nullable)
    }

    fn evaluate(&self, tuple: &Tuple) -> HashFileResult<ScalarValue> {
        tuple.value_by_name(&self.name).cloned()
    }

    fn to_column(&self, input_schema: &Schema) -> HashFileResult<Column> {
        Ok(Column::new(
            self.name.clone(),
            self.data_type(input_schema)?,
            self.nullable(input_schema)?,
        ))
    }
}

impl std::fmt::Display for ColumnExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}
