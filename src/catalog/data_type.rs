use serde::{Deserialize, Serialize};

use crate::error::HashFileError;
use crate::error::HashFileResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Varchar(Option<usize>),
}

impl DataType {
    /// Coerce `lhs_type` and `rhs_type` to a common type for the purposes of a comparison operation
    /// where one both are numeric
    pub fn comparison_numeric_coercion(l: &DataType, r: &DataType) -> HashFileResult<DataType> {
        use super::DataType::*;
        if l == r {
            return Ok(*l);
        }
        match (l, r) {
            (Varchar(_), Varchar(_)) => Ok(Varchar(None)),
            (Boolean, _) | (_, Boolean) | (Varchar(_), _) | (_, Varchar(_)) => {
                Err(HashFileError::Internal(format!(
                    "Cannot coerce {} and {} for comparison",
                    l, r
                )))
            }
            (Float64, _) | (_, Float64) => Ok(Float64),
            (_, Float32) | (Float32, _) => Ok(Float32),
            // Given two integral types, choose the narrowest integral type that
            // holds all values of both. A signed type paired with `UInt64`
            // loses information and lands on `Int64`.
            (Int64, _)
            | (_, Int64)
            | (UInt64, Int8)
            | (Int8, UInt64)
            | (UInt64, Int16)
            | (Int16, UInt64)
            | (UInt64, Int32)
            | (Int32, UInt64)
            | (UInt32, Int8)
            | (Int8, UInt32)
            | (UInt32, Int16)
            | (Int16, UInt32)
            | (UInt32, Int32)
            | (Int32, UInt32) => Ok(Int64),
            (UInt64, _) | (_, UInt64) => Ok(UInt64),
            (Int32, _)
            | (_, Int32)
            | (UInt16, Int16)
            | (Int16, UInt16)
            | (UInt16, Int8)
            | (Int8, UInt16) => Ok(Int32),
            (UInt32, _) | (_, UInt32) => Ok(UInt32),
            (Int16, _) | (_, Int16) | (Int8, UInt8) | (UInt8, Int8) => Ok(Int16),
            (UInt16, _) | (_, UInt16) => Ok(UInt16),
            (Int8, Int8) => Ok(Int8),
            (UInt8, UInt8) => Ok(UInt8),
        }
    }

    /// Encoded width of a non-null value, `None` for variable-length types.
    pub fn fixed_size(&self) -> Option<usize> {
        match self {
            DataType::Boolean | DataType::Int8 | DataType::UInt8 => Some(1),
            DataType::Int16 | DataType::UInt16 => Some(2),
            DataType::Int32 | DataType::UInt32 | DataType::Float32 => Some(4),
            DataType::Int64 | DataType::UInt64 | DataType::Float64 => Some(8),
            DataType::Varchar(_) => None,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64 => write!(f, "{self:?}"),
            DataType::Varchar(len_opt) => {
                if let Some(len) = len_opt {
                    write!(f, "Varchar({len})")
                } else {
                    write!(f, "Varchar")
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::catalog::DataType;

    #[test]
    fn numeric_coercion() {
        assert_eq!(
            DataType::comparison_numeric_coercion(&DataType::Int32, &DataType::Int64).unwrap(),
            DataType::Int64
        );
        assert_eq!(
            DataType::comparison_numeric_coercion(&DataType::Int8, &DataType::Float32).unwrap(),
            DataType::Float32
        );
        assert!(
            DataType::comparison_numeric_coercion(&DataType::Boolean, &DataType::Int32).is_err()
        );
    }
}
