use crate::catalog::SchemaRef;
use crate::error::{HashFileError, HashFileResult};
use crate::storage::codec::{DecodedData, ScalarValueCodec};
use crate::storage::tuple::Tuple;

/// Tuple layout: a null bitmap of `ceil(columns / 8)` bytes (bit `i % 8` of
/// byte `i / 8` set when column `i` is null), then the non-null values in
/// column order.
pub struct TupleCodec;

impl TupleCodec {
    pub fn encode(tuple: &Tuple) -> Vec<u8> {
        let bitmap_len = tuple.data.len().div_ceil(8);
        let mut bytes = vec![0u8; bitmap_len];
        for (idx, value) in tuple.data.iter().enumerate() {
            if value.is_null() {
                bytes[idx / 8] |= 1 << (idx % 8);
            } else {
                bytes.extend(ScalarValueCodec::encode(value));
            }
        }
        bytes
    }

    pub fn decode(bytes: &[u8], schema: SchemaRef) -> HashFileResult<DecodedData<Tuple>> {
        let bitmap_len = schema.column_count().div_ceil(8);
        if bytes.len() < bitmap_len {
            return Err(HashFileError::Internal(format!(
                "bytes length {} is less than null bitmap {}",
                bytes.len(),
                bitmap_len
            )));
        }
        let (bitmap, mut left_bytes) = bytes.split_at(bitmap_len);
        let mut consumed = bitmap_len;
        let mut data = Vec::with_capacity(schema.column_count());
        for (idx, col) in schema.columns.iter().enumerate() {
            if bitmap[idx / 8] & (1 << (idx % 8)) != 0 {
                data.push(crate::utils::scalar::ScalarValue::new_empty(col.data_type));
                continue;
            }
            let (value, offset) = ScalarValueCodec::decode(left_bytes, col.data_type)?;
            data.push(value);
            left_bytes = &left_bytes[offset..];
            consumed += offset;
        }
        Ok((Tuple::new(schema, data), consumed))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::TupleCodec;
    use crate::catalog::{Column, DataType, Schema};
    use crate::storage::tuple::Tuple;
    use crate::utils::scalar::ScalarValue;

    #[test]
    fn tuple_codec_with_nulls() {
        let schema = Arc::new(Schema::new(vec![
            Column::new("a", DataType::Boolean, true),
            Column::new("b", DataType::Int32, true),
            Column::new("c", DataType::Varchar(Some(10)), true),
        ]));
        let tuple = Tuple::new(
            schema.clone(),
            vec![true.into(), ScalarValue::Int32(None), "abc".into()],
        );
        let bytes = TupleCodec::encode(&tuple);
        // bitmap + bool + (len + "abc")
        assert_eq!(bytes.len(), 1 + 1 + 7);
        assert_eq!(bytes[0], 0b010);

        let mut padded = bytes.clone();
        padded.extend([0xFF, 0xFF]);
        let (decoded, consumed) = TupleCodec::decode(&padded, schema).unwrap();
        assert_eq!(decoded, tuple);
        assert_eq!(consumed, bytes.len());
    }
}
