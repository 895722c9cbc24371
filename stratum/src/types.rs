use bytes::{Buf, BufMut};

use crate::error::{DbError, DbResult};

/// Fixed capacity of a text field on disk. Text payloads are stored as a
/// 4-byte big-endian length followed by exactly this many bytes.
pub const STRING_CAPACITY: usize = 128;

/// The type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int,
    Text,
}

impl DataType {
    /// On-disk footprint of a value of this type, in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            DataType::Int => 4,
            DataType::Text => 4 + STRING_CAPACITY,
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DataType::Int => write!(f, "INT"),
            DataType::Text => write!(f, "TEXT"),
        }
    }
}

/// A typed column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Int(i32),
    Text(String),
}

impl Value {
    /// Builds a text value, rejecting payloads over [`STRING_CAPACITY`].
    pub fn text<S: Into<String>>(s: S) -> DbResult<Self> {
        let s = s.into();
        if s.len() > STRING_CAPACITY {
            return Err(DbError::IllegalArgument(format!(
                "text value of {} bytes exceeds capacity {}",
                s.len(),
                STRING_CAPACITY
            )));
        }
        Ok(Value::Text(s))
    }

    pub fn data_type(&self) -> DataType {
        match self {
            Value::Int(_) => DataType::Int,
            Value::Text(_) => DataType::Text,
        }
    }

    /// Writes the value in its on-disk encoding: integers as 4-byte
    /// big-endian two's complement, text as a big-endian length prefix
    /// followed by the payload zero-padded to [`STRING_CAPACITY`].
    pub fn write_to<B: BufMut>(&self, buf: &mut B) {
        match self {
            Value::Int(v) => buf.put_i32(*v),
            Value::Text(s) => {
                // Truncate at the field boundary; [`Value::text`] already
                // rejects oversized payloads on the checked path.
                let payload = &s.as_bytes()[..s.len().min(STRING_CAPACITY)];
                buf.put_i32(payload.len() as i32);
                buf.put_slice(payload);
                buf.put_bytes(0, STRING_CAPACITY - payload.len());
            }
        }
    }

    /// Reads a value of the given type from its on-disk encoding.
    pub fn read_from<B: Buf>(dtype: DataType, buf: &mut B) -> DbResult<Self> {
        match dtype {
            DataType::Int => {
                if buf.remaining() < 4 {
                    return Err(DbError::Corrupt("truncated int field".to_string()));
                }
                Ok(Value::Int(buf.get_i32()))
            }
            DataType::Text => {
                if buf.remaining() < 4 + STRING_CAPACITY {
                    return Err(DbError::Corrupt("truncated text field".to_string()));
                }
                let len = buf.get_i32();
                if len < 0 || len as usize > STRING_CAPACITY {
                    return Err(DbError::Corrupt(format!(
                        "text length {} out of range",
                        len
                    )));
                }
                let mut payload = vec![0u8; STRING_CAPACITY];
                buf.copy_to_slice(&mut payload);
                payload.truncate(len as usize);
                let s = String::from_utf8(payload)
                    .map_err(|_| DbError::Corrupt("text field is not utf-8".to_string()))?;
                Ok(Value::Text(s))
            }
        }
    }

    /// Ordering between two values of the same type. Values of different
    /// types are incomparable.
    pub fn try_cmp(&self, other: &Value) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Text(a), Value::Text(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Text(s) => write!(f, "{}", s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::BytesMut;

    #[test]
    fn int_encoding_is_big_endian() {
        let mut buf = BytesMut::new();
        Value::Int(0x0102_0304).write_to(&mut buf);
        assert_eq!(&buf[..], &[0x01, 0x02, 0x03, 0x04]);
    }

    #[test]
    fn text_encoding_is_length_prefixed_and_padded() {
        let mut buf = BytesMut::new();
        Value::text("ab").unwrap().write_to(&mut buf);
        assert_eq!(buf.len(), DataType::Text.byte_len());
        assert_eq!(&buf[..4], &[0, 0, 0, 2]);
        assert_eq!(&buf[4..6], b"ab");
        assert!(buf[6..].iter().all(|b| *b == 0));
    }

    #[test]
    fn values_round_trip() {
        for value in [Value::Int(-7), Value::text("hello").unwrap()] {
            let mut buf = BytesMut::new();
            value.write_to(&mut buf);
            let mut slice = &buf[..];
            let decoded = Value::read_from(value.data_type(), &mut slice).unwrap();
            assert_eq!(decoded, value);
        }
    }

    #[test]
    fn oversized_text_is_rejected() {
        let s = "x".repeat(STRING_CAPACITY + 1);
        assert!(matches!(Value::text(s), Err(DbError::IllegalArgument(_))));
    }

    #[test]
    fn negative_stored_length_is_corrupt() {
        let mut buf = BytesMut::new();
        buf.put_i32(-1);
        buf.put_bytes(0, STRING_CAPACITY);
        let mut slice = &buf[..];
        assert!(matches!(
            Value::read_from(DataType::Text, &mut slice),
            Err(DbError::Corrupt(_))
        ));
    }

    #[test]
    fn cross_type_comparison_is_none() {
        assert!(Value::Int(1).try_cmp(&Value::text("1").unwrap()).is_none());
    }
}
