use crate::error::{HashFileError, HashFileResult};
use crate::storage::codec::DecodedData;

/// Big-endian primitive codecs shared by the page and tuple formats.
pub struct CommonCodec;

fn short_input(len: usize, need: usize) -> HashFileError {
    HashFileError::Internal(format!("bytes length {} is less than {}", len, need))
}

macro_rules! fixed_width_codec {
    ($encode:ident, $decode:ident, $ty:ty) => {
        pub fn $encode(data: $ty) -> Vec<u8> {
            data.to_be_bytes().to_vec()
        }

        pub fn $decode(bytes: &[u8]) -> HashFileResult<DecodedData<$ty>> {
            const WIDTH: usize = std::mem::size_of::<$ty>();
            let Some(raw) = bytes.get(..WIDTH) else {
                return Err(short_input(bytes.len(), WIDTH));
            };
            let mut buf = [0u8; WIDTH];
            buf.copy_from_slice(raw);
            Ok((<$ty>::from_be_bytes(buf), WIDTH))
        }
    };
}

impl CommonCodec {
    pub fn encode_bool(data: bool) -> Vec<u8> {
        if data {
            vec![1]
        } else {
            vec![0]
        }
    }

    pub fn decode_bool(bytes: &[u8]) -> HashFileResult<DecodedData<bool>> {
        if bytes.is_empty() {
            return Err(short_input(bytes.len(), 1));
        }
        Ok((bytes[0] != 0, 1))
    }

    fixed_width_codec!(encode_u8, decode_u8, u8);
    fixed_width_codec!(encode_u16, decode_u16, u16);
    fixed_width_codec!(encode_u32, decode_u32, u32);
    fixed_width_codec!(encode_u64, decode_u64, u64);
    fixed_width_codec!(encode_i8, decode_i8, i8);
    fixed_width_codec!(encode_i16, decode_i16, i16);
    fixed_width_codec!(encode_i32, decode_i32, i32);
    fixed_width_codec!(encode_i64, decode_i64, i64);
    fixed_width_codec!(encode_f32, decode_f32, f32);
    fixed_width_codec!(encode_f64, decode_f64, f64);

    /// Length-prefixed (u32) byte string.
    pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(4 + data.len());
        bytes.extend(CommonCodec::encode_u32(data.len() as u32));
        bytes.extend_from_slice(data);
        bytes
    }

    pub fn decode_bytes(bytes: &[u8]) -> HashFileResult<DecodedData<Vec<u8>>> {
        let (length, offset) = CommonCodec::decode_u32(bytes)?;
        let end = offset + length as usize;
        if bytes.len() < end {
            return Err(short_input(bytes.len(), end));
        }
        Ok((bytes[offset..end].to_vec(), end))
    }

    pub fn decode_string(bytes: &[u8]) -> HashFileResult<DecodedData<String>> {
        let (raw, offset) = CommonCodec::decode_bytes(bytes)?;
        let data = String::from_utf8(raw)
            .map_err(|e| HashFileError::Internal(format!("Failed to decode string {}", e)))?;
        Ok((data, offset))
    }

    /// Reads a big-endian u16 at `offset` of a page buffer.
    pub fn read_u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_be_bytes([bytes[offset], bytes[offset + 1]])
    }

    pub fn write_u16_at(bytes: &mut [u8], offset: usize, value: u16) {
        bytes[offset..offset + 2].copy_from_slice(&value.to_be_bytes());
    }
}

#[cfg(test)]
mod tests {
    use super::CommonCodec;

    #[test]
    fn fixed_width_round_trip_consumes_width() {
        let bytes = CommonCodec::encode_i32(-5);
        assert_eq!(bytes, vec![0xFF, 0xFF, 0xFF, 0xFB]);
        assert_eq!(CommonCodec::decode_i32(&bytes).unwrap(), (-5, 4));
        assert!(CommonCodec::decode_u64(&bytes).is_err());
        assert_eq!(CommonCodec::decode_u16(&[0x01, 0x02, 0x03]).unwrap(), (258, 2));
    }

    #[test]
    fn length_prefixed_bytes() {
        let bytes = CommonCodec::encode_bytes(b"abc");
        assert_eq!(bytes.len(), 7);
        assert_eq!(CommonCodec::decode_string(&bytes).unwrap(), ("abc".to_string(), 7));
        assert!(CommonCodec::decode_bytes(&bytes[..5]).is_err());
    }

    #[test]
    fn page_u16_helpers() {
        let mut page = vec![0u8; 8];
        CommonCodec::write_u16_at(&mut page, 4, 0xBEEF);
        assert_eq!(page[4], 0xBE);
        assert_eq!(CommonCodec::read_u16_at(&page, 4), 0xBEEF);
    }
}
