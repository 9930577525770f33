use crate::catalog::SchemaRef;
use crate::error::HashFileError;
use crate::{error::HashFileResult, utils::scalar::ScalarValue};
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Tuple {
    pub schema: SchemaRef,
    pub data: Vec<ScalarValue>,
}

impl Tuple {
    pub fn new(schema: SchemaRef, data: Vec<ScalarValue>) -> Self {
        debug_assert_eq!(schema.columns.len(), data.len());
        debug_assert!(schema
            .columns
            .iter()
            .zip(data.iter())
            .all(|(col, val)| ScalarValue::new_empty(col.data_type).data_type() == val.data_type()));
        Self { schema, data }
    }

    /// Tuple of the values at `indices`, in that order.
    pub fn project(&self, indices: &[usize]) -> HashFileResult<Self> {
        let schema = Arc::new(self.schema.project(indices)?);
        let data = indices
            .iter()
            .map(|idx| self.value(*idx).cloned())
            .collect::<HashFileResult<Vec<ScalarValue>>>()?;
        Ok(Self::new(schema, data))
    }

    pub fn is_null(&self) -> bool {
        self.data.iter().all(|x| x.is_null())
    }

    pub fn value(&self, index: usize) -> HashFileResult<&ScalarValue> {
        self.data.get(index).ok_or(HashFileError::Internal(format!(
            "Not found column data at {} in tuple: {:?}",
            index, self
        )))
    }

    pub fn value_by_name(&self, name: &str) -> HashFileResult<&ScalarValue> {
        let idx = self.schema.index_of(name)?;
        self.value(idx)
    }
}

impl PartialOrd for Tuple {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        let column_count = self.schema.column_count();
        for idx in 0..column_count {
            let order = self.value(idx).ok()?.partial_cmp(other.value(idx).ok()?)?;
            if order != Ordering::Equal {
                return Some(order);
            }
        }
        Some(Ordering::Equal)
    }
}

impl Display for Tuple {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let values = self
            .data
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<String>>()
            .join(", ");
        write!(f, "({})", values)
    }
}
