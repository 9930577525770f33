use crate::catalog::DataType;
use crate::error::{HashFileError, HashFileResult};
use crate::storage::codec::{CommonCodec, DecodedData};
use crate::utils::scalar::ScalarValue;

pub struct ScalarValueCodec;

impl ScalarValueCodec {
    /// Encodes a non-null value. Nulls carry no bytes; the tuple format
    /// records them in its null bitmap.
    pub fn encode(value: &ScalarValue) -> Vec<u8> {
        match value {
            ScalarValue::Boolean(Some(v)) => CommonCodec::encode_bool(*v),
            ScalarValue::Int8(Some(v)) => CommonCodec::encode_i8(*v),
            ScalarValue::Int16(Some(v)) => CommonCodec::encode_i16(*v),
            ScalarValue::Int32(Some(v)) => CommonCodec::encode_i32(*v),
            ScalarValue::Int64(Some(v)) => CommonCodec::encode_i64(*v),
            ScalarValue::UInt8(Some(v)) => CommonCodec::encode_u8(*v),
            ScalarValue::UInt16(Some(v)) => CommonCodec::encode_u16(*v),
            ScalarValue::UInt32(Some(v)) => CommonCodec::encode_u32(*v),
            ScalarValue::UInt64(Some(v)) => CommonCodec::encode_u64(*v),
            ScalarValue::Float32(Some(v)) => CommonCodec::encode_f32(*v),
            ScalarValue::Float64(Some(v)) => CommonCodec::encode_f64(*v),
            ScalarValue::Varchar(Some(v)) => CommonCodec::encode_bytes(v.as_bytes()),
            _ => vec![],
        }
    }

    pub fn decode(bytes: &[u8], data_type: DataType) -> HashFileResult<DecodedData<ScalarValue>> {
        match data_type {
            DataType::Boolean => {
                let (value, offset) = CommonCodec::decode_bool(bytes)?;
                Ok((ScalarValue::Boolean(Some(value)), offset))
            }
            DataType::Int8 => {
                let (value, offset) = CommonCodec::decode_i8(bytes)?;
                Ok((ScalarValue::Int8(Some(value)), offset))
            }
            DataType::Int16 => {
                let (value, offset) = CommonCodec::decode_i16(bytes)?;
                Ok((ScalarValue::Int16(Some(value)), offset))
            }
            DataType::Int32 => {
                let (value, offset) = CommonCodec::decode_i32(bytes)?;
                Ok((ScalarValue::Int32(Some(value)), offset))
            }
            DataType::Int64 => {
                let (value, offset) = CommonCodec::decode_i64(bytes)?;
                Ok((ScalarValue::Int64(Some(value)), offset))
            }
            DataType::UInt8 => {
                let (value, offset) = CommonCodec::decode_u8(bytes)?;
                Ok((ScalarValue::UInt8(Some(value)), offset))
            }
            DataType::UInt16 => {
                let (value, offset) = CommonCodec::decode_u16(bytes)?;
                Ok((ScalarValue::UInt16(Some(value)), offset))
            }
            DataType::UInt32 => {
                let (value, offset) = CommonCodec::decode_u32(bytes)?;
                Ok((ScalarValue::UInt32(Some(value)), offset))
            }
            DataType::UInt64 => {
                let (value, offset) = CommonCodec::decode_u64(bytes)?;
                Ok((ScalarValue::UInt64(Some(value)), offset))
            }
            DataType::Float32 => {
                let (value, offset) = CommonCodec::decode_f32(bytes)?;
                Ok((ScalarValue::Float32(Some(value)), offset))
            }
            DataType::Float64 => {
                let (value, offset) = CommonCodec::decode_f64(bytes)?;
                Ok((ScalarValue::Float64(Some(value)), offset))
            }
            DataType::Varchar(max_len) => {
                let (value, offset) = CommonCodec::decode_string(bytes)?;
                if let Some(max_len) = max_len {
                    if value.len() > max_len {
                        return Err(HashFileError::Internal(format!(
                            "Stored varchar of {} bytes exceeds declared length {}",
                            value.len(),
                            max_len
                        )));
                    }
                }
                Ok((ScalarValue::Varchar(Some(value)), offset))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_codec_widths() {
        let bytes = ScalarValueCodec::encode(&ScalarValue::Int64(Some(-2)));
        assert_eq!(bytes.len(), 8);
        assert_eq!(
            ScalarValueCodec::decode(&bytes, DataType::Int64).unwrap(),
            (ScalarValue::Int64(Some(-2)), 8)
        );
        assert!(ScalarValueCodec::encode(&ScalarValue::Int32(None)).is_empty());

        let bytes = ScalarValueCodec::encode(&"hello".into());
        assert_eq!(bytes.len(), 9);
        assert!(ScalarValueCodec::decode(&bytes, DataType::Varchar(Some(3))).is_err());
        assert_eq!(
            ScalarValueCodec::decode(&bytes, DataType::Varchar(None)).unwrap().1,
            9
        );
    }
}
