//! Length-prefixed key/value framing for the append-only log.
//!
//! Layout: `[key_len: u32 LE][value_len: u32 LE][key bytes][value bytes][crc32: u32 LE]`.
//! The CRC covers the key and value bytes only. A record is self-delimiting:
//! decoding from any record boundary yields the record plus the number of
//! bytes consumed, without reference to anything outside the buffer.

use crate::store::error::StoreError;

const LEN_FIELD_SIZE: usize = 4;
const HEADER_SIZE: usize = LEN_FIELD_SIZE * 2;
const CRC_SIZE: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl Record {
    pub fn new(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Encode this record into a self-delimiting byte string.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.key.len() + self.value.len() + CRC_SIZE);
        buf.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        buf.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.key);
        buf.extend_from_slice(&self.value);
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&self.key);
        hasher.update(&self.value);
        buf.extend_from_slice(&hasher.finalize().to_le_bytes());
        buf
    }

    /// Decode one record starting at `buf[0]`. Returns the record and the
    /// number of bytes consumed. `CorruptRecord` if the buffer is shorter
    /// than the declared lengths, if the key is empty, or if the CRC does
    /// not match.
    pub fn decode(buf: &[u8]) -> Result<(Record, usize), StoreError> {
        if buf.len() < HEADER_SIZE {
            return Err(StoreError::CorruptRecord(
                "buffer shorter than record header".into(),
            ));
        }

        let key_len = u32::from_le_bytes(buf[0..4].try_into().unwrap()) as usize;
        let value_len = u32::from_le_bytes(buf[4..8].try_into().unwrap()) as usize;

        if key_len == 0 {
            return Err(StoreError::CorruptRecord("record key is empty".into()));
        }

        let total = HEADER_SIZE + key_len + value_len + CRC_SIZE;
        if buf.len() < total {
            return Err(StoreError::CorruptRecord(
                "buffer shorter than declared key/value lengths".into(),
            ));
        }

        let key = buf[HEADER_SIZE..HEADER_SIZE + key_len].to_vec();
        let value_start = HEADER_SIZE + key_len;
        let value = buf[value_start..value_start + value_len].to_vec();

        let crc_start = value_start + value_len;
        let stored_crc = u32::from_le_bytes(buf[crc_start..crc_start + CRC_SIZE].try_into().unwrap());

        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&key);
        hasher.update(&value);
        if hasher.finalize() != stored_crc {
            return Err(StoreError::CorruptRecord("crc mismatch".into()));
        }

        Ok((Record { key, value }, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_encode_decode() {
        let record = Record::new(b"hello".to_vec(), b"world".to_vec());
        let encoded = record.encode();
        let (decoded, consumed) = Record::decode(&encoded).unwrap();
        assert_eq!(decoded, record);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn empty_value_round_trips() {
        let record = Record::new(b"k".to_vec(), Vec::new());
        let encoded = record.encode();
        let (decoded, _) = Record::decode(&encoded).unwrap();
        assert_eq!(decoded.value, Vec::<u8>::new());
    }

    #[test]
    fn rejects_truncated_buffer() {
        let record = Record::new(b"k".to_vec(), b"value".to_vec());
        let mut encoded = record.encode();
        encoded.truncate(encoded.len() - 2);
        assert!(matches!(
            Record::decode(&encoded),
            Err(StoreError::CorruptRecord(_))
        ));
    }

    #[test]
    fn rejects_empty_key() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(&0u32.to_le_bytes());
        assert!(matches!(
            Record::decode(&buf),
            Err(StoreError::CorruptRecord(_))
        ));
    }

    #[test]
    fn decode_reports_bytes_consumed_for_chained_records() {
        let a = Record::new(b"a".to_vec(), b"1".to_vec()).encode();
        let b = Record::new(b"bb".to_vec(), b"22".to_vec()).encode();
        let mut buf = a.clone();
        buf.extend_from_slice(&b);

        let (rec1, consumed1) = Record::decode(&buf).unwrap();
        assert_eq!(rec1.key, b"a");
        assert_eq!(consumed1, a.len());

        let (rec2, consumed2) = Record::decode(&buf[consumed1..]).unwrap();
        assert_eq!(rec2.key, b"bb");
        assert_eq!(consumed2, b.len());
    }
}
