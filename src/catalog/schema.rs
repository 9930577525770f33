use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::column::{Column, ColumnRef};
use crate::error::HashFileError;
use crate::error::HashFileResult;

pub type SchemaRef = Arc<Schema>;

#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    pub columns: Vec<ColumnRef>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        Self::new_with_check(columns.into_iter().map(Arc::new).collect())
    }

    fn new_with_check(columns: Vec<ColumnRef>) -> Self {
        for (idx1, col1) in columns.iter().enumerate() {
            for col2 in columns.iter().skip(idx1 + 1) {
                assert_ne!(col1.name, col2.name);
            }
        }
        Self { columns }
    }

    pub fn project(&self, indices: &[usize]) -> HashFileResult<Schema> {
        let new_columns = indices
            .iter()
            .map(|i| self.column_with_index(*i))
            .collect::<HashFileResult<Vec<ColumnRef>>>()?;
        Ok(Schema::new_with_check(new_columns))
    }

    pub fn column_with_name(&self, name: &str) -> HashFileResult<ColumnRef> {
        let index = self.index_of(name)?;
        Ok(self.columns[index].clone())
    }

    pub fn column_with_index(&self, index: usize) -> HashFileResult<ColumnRef> {
        self.columns
            .get(index)
            .cloned()
            .ok_or_else(|| HashFileError::Plan(format!("Unable to get column with index {index}")))
    }

    /// Find the index of the column with the given name.
    pub fn index_of(&self, name: &str) -> HashFileResult<usize> {
        self.columns
            .iter()
            .position(|col| col.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| HashFileError::Plan(format!("Unable to get column named \"{name}\"")))
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DataType;

    #[test]
    fn project_keeps_requested_order() {
        let schema = Schema::new(vec![
            Column::new("a", DataType::Int32, false),
            Column::new("b", DataType::Varchar(None), true),
            Column::new("c", DataType::Int64, false),
        ]);
        let projected = schema.project(&[2, 0]).unwrap();
        assert_eq!(projected.columns[0].name, "c");
        assert_eq!(projected.columns[1].name, "a");
        assert_eq!(schema.index_of("B").unwrap(), 1);
        assert!(schema.project(&[3]).is_err());
    }
}
