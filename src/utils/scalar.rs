use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::catalog::DataType;
use crate::error::{HashFileError, HashFileResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScalarValue {
    Boolean(Option<bool>),
    Int8(Option<i8>),
    Int16(Option<i16>),
    Int32(Option<i32>),
    Int64(Option<i64>),
    UInt8(Option<u8>),
    UInt16(Option<u16>),
    UInt32(Option<u32>),
    UInt64(Option<u64>),
    Float32(Option<f32>),
    Float64(Option<f64>),
    Varchar(Option<String>),
}

macro_rules! cast_integral {
    ($value:expr, $ty:ty, $variant:ident, $error:expr) => {
        <$ty>::try_from($value)
            .map(|v| ScalarValue::$variant(Some(v)))
            .map_err(|_| $error)
    };
}

impl ScalarValue {
    pub fn new_empty(data_type: DataType) -> Self {
        match data_type {
            DataType::Boolean => Self::Boolean(None),
            DataType::Int8 => Self::Int8(None),
            DataType::Int16 => Self::Int16(None),
            DataType::Int32 => Self::Int32(None),
            DataType::Int64 => Self::Int64(None),
            DataType::UInt8 => Self::UInt8(None),
            DataType::UInt16 => Self::UInt16(None),
            DataType::UInt32 => Self::UInt32(None),
            DataType::UInt64 => Self::UInt64(None),
            DataType::Float32 => Self::Float32(None),
            DataType::Float64 => Self::Float64(None),
            DataType::Varchar(_) => Self::Varchar(None),
        }
    }

    pub fn data_type(&self) -> DataType {
        match self {
            ScalarValue::Boolean(_) => DataType::Boolean,
            ScalarValue::Int8(_) => DataType::Int8,
            ScalarValue::Int16(_) => DataType::Int16,
            ScalarValue::Int32(_) => DataType::Int32,
            ScalarValue::Int64(_) => DataType::Int64,
            ScalarValue::UInt8(_) => DataType::UInt8,
            ScalarValue::UInt16(_) => DataType::UInt16,
            ScalarValue::UInt32(_) => DataType::UInt32,
            ScalarValue::UInt64(_) => DataType::UInt64,
            ScalarValue::Float32(_) => DataType::Float32,
            ScalarValue::Float64(_) => DataType::Float64,
            ScalarValue::Varchar(_) => DataType::Varchar(None),
        }
    }

    pub fn is_null(&self) -> bool {
        match self {
            ScalarValue::Boolean(v) => v.is_none(),
            ScalarValue::Int8(v) => v.is_none(),
            ScalarValue::Int16(v) => v.is_none(),
            ScalarValue::Int32(v) => v.is_none(),
            ScalarValue::Int64(v) => v.is_none(),
            ScalarValue::UInt8(v) => v.is_none(),
            ScalarValue::UInt16(v) => v.is_none(),
            ScalarValue::UInt32(v) => v.is_none(),
            ScalarValue::UInt64(v) => v.is_none(),
            ScalarValue::Float32(v) => v.is_none(),
            ScalarValue::Float64(v) => v.is_none(),
            ScalarValue::Varchar(v) => v.is_none(),
        }
    }

    fn integral_value(&self) -> Option<i128> {
        match self {
            ScalarValue::Int8(Some(v)) => Some(*v as i128),
            ScalarValue::Int16(Some(v)) => Some(*v as i128),
            ScalarValue::Int32(Some(v)) => Some(*v as i128),
            ScalarValue::Int64(Some(v)) => Some(*v as i128),
            ScalarValue::UInt8(Some(v)) => Some(*v as i128),
            ScalarValue::UInt16(Some(v)) => Some(*v as i128),
            ScalarValue::UInt32(Some(v)) => Some(*v as i128),
            ScalarValue::UInt64(Some(v)) => Some(*v as i128),
            _ => None,
        }
    }

    fn float_value(&self) -> Option<f64> {
        match self {
            ScalarValue::Float32(Some(v)) => Some(*v as f64),
            ScalarValue::Float64(Some(v)) => Some(*v),
            _ => self.integral_value().map(|v| v as f64),
        }
    }

    /// Try to cast this value to a ScalarValue of type `data_type`.
    /// Integral casts are range checked; nulls cast to a null of the target type.
    pub fn cast_to(&self, data_type: &DataType) -> HashFileResult<Self> {
        let error =
            HashFileError::NotSupport(format!("Failed to cast {:?} to {} type", self, data_type));

        if &self.data_type() == data_type
            || matches!(
                (self, data_type),
                (ScalarValue::Varchar(_), DataType::Varchar(_))
            )
        {
            return Ok(self.clone());
        }
        if self.is_null() {
            return Ok(ScalarValue::new_empty(*data_type));
        }

        match data_type {
            DataType::Float32 => self
                .float_value()
                .map(|v| ScalarValue::Float32(Some(v as f32)))
                .ok_or(error),
            DataType::Float64 => self
                .float_value()
                .map(|v| ScalarValue::Float64(Some(v)))
                .ok_or(error),
            DataType::Varchar(_) => match self {
                ScalarValue::Boolean(_) => Err(error),
                other => Ok(ScalarValue::Varchar(Some(other.to_string()))),
            },
            DataType::Boolean => Err(error),
            integral => {
                let Some(v) = self.integral_value() else {
                    return Err(error);
                };
                match integral {
                    DataType::Int8 => cast_integral!(v, i8, Int8, error),
                    DataType::Int16 => cast_integral!(v, i16, Int16, error),
                    DataType::Int32 => cast_integral!(v, i32, Int32, error),
                    DataType::Int64 => cast_integral!(v, i64, Int64, error),
                    DataType::UInt8 => cast_integral!(v, u8, UInt8, error),
                    DataType::UInt16 => cast_integral!(v, u16, UInt16, error),
                    DataType::UInt32 => cast_integral!(v, u32, UInt32, error),
                    DataType::UInt64 => cast_integral!(v, u64, UInt64, error),
                    _ => Err(error),
                }
            }
        }
    }

    pub fn as_boolean(&self) -> HashFileResult<Option<bool>> {
        match self {
            ScalarValue::Boolean(v) => Ok(*v),
            _ => Err(HashFileError::Internal(format!(
                "Cannot treat {:?} as boolean",
                self
            ))),
        }
    }

    /// Platform-independent hash code. Bucket placement on disk depends on
    /// it, so it must never change between releases.
    pub fn stable_hash(&self) -> i32 {
        fn fold(v: u64) -> i32 {
            (v ^ (v >> 32)) as i32
        }
        match self {
            ScalarValue::Boolean(Some(true)) => 1231,
            ScalarValue::Boolean(Some(false)) => 1237,
            ScalarValue::Int8(Some(v)) => *v as i32,
            ScalarValue::Int16(Some(v)) => *v as i32,
            ScalarValue::Int32(Some(v)) => *v,
            ScalarValue::Int64(Some(v)) => fold(*v as u64),
            ScalarValue::UInt8(Some(v)) => *v as i32,
            ScalarValue::UInt16(Some(v)) => *v as i32,
            ScalarValue::UInt32(Some(v)) => *v as i32,
            ScalarValue::UInt64(Some(v)) => fold(*v),
            ScalarValue::Float32(Some(v)) => v.to_bits() as i32,
            ScalarValue::Float64(Some(v)) => fold(v.to_bits()),
            ScalarValue::Varchar(Some(s)) => s
                .bytes()
                .fold(0i32, |h, b| h.wrapping_mul(31).wrapping_add(b as i32)),
            _ => 0,
        }
    }
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl Eq for ScalarValue {}

impl PartialOrd for ScalarValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        use ScalarValue::*;
        match (self, other) {
            (Boolean(v1), Boolean(v2)) => v1.partial_cmp(v2),
            (Int8(v1), Int8(v2)) => v1.partial_cmp(v2),
            (Int16(v1), Int16(v2)) => v1.partial_cmp(v2),
            (Int32(v1), Int32(v2)) => v1.partial_cmp(v2),
            (Int64(v1), Int64(v2)) => v1.partial_cmp(v2),
            (UInt8(v1), UInt8(v2)) => v1.partial_cmp(v2),
            (UInt16(v1), UInt16(v2)) => v1.partial_cmp(v2),
            (UInt32(v1), UInt32(v2)) => v1.partial_cmp(v2),
            (UInt64(v1), UInt64(v2)) => v1.partial_cmp(v2),
            (Float32(v1), Float32(v2)) => match (v1, v2) {
                (Some(f1), Some(f2)) => Some(f1.total_cmp(f2)),
                _ => Some(v1.is_some().cmp(&v2.is_some())),
            },
            (Float64(v1), Float64(v2)) => match (v1, v2) {
                (Some(f1), Some(f2)) => Some(f1.total_cmp(f2)),
                _ => Some(v1.is_some().cmp(&v2.is_some())),
            },
            (Varchar(v1), Varchar(v2)) => v1.partial_cmp(v2),
            _ => None,
        }
    }
}

impl std::hash::Hash for ScalarValue {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        use ScalarValue::*;
        std::mem::discriminant(self).hash(state);
        match self {
            Boolean(v) => v.hash(state),
            // Floats hash by bit pattern, matching `eq`.
            Float32(v) => v.map(f32::to_bits).hash(state),
            Float64(v) => v.map(f64::to_bits).hash(state),
            Int8(v) => v.hash(state),
            Int16(v) => v.hash(state),
            Int32(v) => v.hash(state),
            Int64(v) => v.hash(state),
            UInt8(v) => v.hash(state),
            UInt16(v) => v.hash(state),
            UInt32(v) => v.hash(state),
            UInt64(v) => v.hash(state),
            Varchar(v) => v.hash(state),
        }
    }
}

impl std::fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            ScalarValue::Boolean(Some(v)) => write!(f, "{v}"),
            ScalarValue::Int8(Some(v)) => write!(f, "{v}"),
            ScalarValue::Int16(Some(v)) => write!(f, "{v}"),
            ScalarValue::Int32(Some(v)) => write!(f, "{v}"),
            ScalarValue::Int64(Some(v)) => write!(f, "{v}"),
            ScalarValue::UInt8(Some(v)) => write!(f, "{v}"),
            ScalarValue::UInt16(Some(v)) => write!(f, "{v}"),
            ScalarValue::UInt32(Some(v)) => write!(f, "{v}"),
            ScalarValue::UInt64(Some(v)) => write!(f, "{v}"),
            ScalarValue::Float32(Some(v)) => write!(f, "{v}"),
            ScalarValue::Float64(Some(v)) => write!(f, "{v}"),
            ScalarValue::Varchar(Some(v)) => write!(f, "{v}"),
            _ => write!(f, "NULL"),
        }
    }
}

macro_rules! impl_from_for_scalar {
    ($ty:ty, $scalar:tt) => {
        impl From<$ty> for ScalarValue {
            fn from(value: $ty) -> Self {
                ScalarValue::$scalar(Some(value))
            }
        }

        impl From<Option<$ty>> for ScalarValue {
            fn from(value: Option<$ty>) -> Self {
                ScalarValue::$scalar(value)
            }
        }
    };
}

impl_from_for_scalar!(bool, Boolean);
impl_from_for_scalar!(i8, Int8);
impl_from_for_scalar!(i16, Int16);
impl_from_for_scalar!(i32, Int32);
impl_from_for_scalar!(i64, Int64);
impl_from_for_scalar!(u8, UInt8);
impl_from_for_scalar!(u16, UInt16);
impl_from_for_scalar!(u32, UInt32);
impl_from_for_scalar!(u64, UInt64);
impl_from_for_scalar!(f32, Float32);
impl_from_for_scalar!(f64, Float64);
impl_from_for_scalar!(String, Varchar);

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        ScalarValue::Varchar(Some(value.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cast_checks_integral_range() {
        assert_eq!(
            ScalarValue::Int64(Some(42)).cast_to(&DataType::Int32).unwrap(),
            ScalarValue::Int32(Some(42))
        );
        assert!(ScalarValue::Int64(Some(300))
            .cast_to(&DataType::Int8)
            .is_err());
        assert_eq!(
            ScalarValue::Int32(None).cast_to(&DataType::Int64).unwrap(),
            ScalarValue::Int64(None)
        );
        assert_eq!(
            ScalarValue::Int16(Some(7)).cast_to(&DataType::Float64).unwrap(),
            ScalarValue::Float64(Some(7.0))
        );
        assert!(ScalarValue::Float64(Some(1.5))
            .cast_to(&DataType::Int32)
            .is_err());
    }

    #[test]
    fn stable_hash_is_fixed() {
        assert_eq!(ScalarValue::Int32(Some(17)).stable_hash(), 17);
        assert_eq!(ScalarValue::Int64(Some(17)).stable_hash(), 17);
        assert_eq!(ScalarValue::Varchar(Some("ab".to_string())).stable_hash(), 97 * 31 + 98);
        assert_eq!(ScalarValue::Varchar(None).stable_hash(), 0);
        assert_eq!(ScalarValue::Boolean(Some(true)).stable_hash(), 1231);
    }

    #[test]
    fn floats_compare_by_total_order() {
        let a = ScalarValue::Float64(Some(1.0));
        let b = ScalarValue::Float64(Some(2.0));
        assert!(a < b);
        assert_eq!(a, ScalarValue::Float64(Some(1.0)));
        assert_ne!(a, ScalarValue::Float32(Some(1.0)));
        assert!(ScalarValue::Float64(None) < a);
    }
}
