use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Leading bytes of every encoded object file.
pub const MAGIC: &[u8; 2] = b"MJ";

const HEADER_LEN: usize = 2 + 3 * 4;

/// The output of a compilation: what the VM needs to run a program.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ObjectFile {
    /// Number of global variable words.
    pub data_size: i32,
    /// Entry address, or -1 if the program has no `main`.
    pub main_pc: i32,
    pub code: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ObjectFileError {
    #[error("not an object file (bad magic)")]
    BadMagic,
    #[error("object file truncated: expected {expected} bytes, found {found}")]
    Truncated { expected: usize, found: usize },
    #[error("invalid object header: {0}")]
    BadHeader(&'static str),
    #[error("postcard encoding failed: {0}")]
    Postcard(String),
}

impl ObjectFile {
    /// Binary image: magic, code size, data size, main pc, then the code.
    /// All header words are big-endian.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.code.len());
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(self.code.len() as i32).to_be_bytes());
        out.extend_from_slice(&self.data_size.to_be_bytes());
        out.extend_from_slice(&self.main_pc.to_be_bytes());
        out.extend_from_slice(&self.code);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, ObjectFileError> {
        if bytes.len() < 2 || &bytes[..2] != MAGIC {
            return Err(ObjectFileError::BadMagic);
        }
        if bytes.len() < HEADER_LEN {
            return Err(ObjectFileError::Truncated {
                expected: HEADER_LEN,
                found: bytes.len(),
            });
        }

        let word = |at: usize| i32::from_be_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let code_size = word(2);
        let data_size = word(6);
        let main_pc = word(10);

        if code_size < 0 {
            return Err(ObjectFileError::BadHeader("negative code size"));
        }
        if data_size < 0 {
            return Err(ObjectFileError::BadHeader("negative data size"));
        }
        if main_pc < -1 || main_pc >= code_size.max(1) {
            return Err(ObjectFileError::BadHeader("main pc outside of code"));
        }

        let expected = HEADER_LEN + code_size as usize;
        if bytes.len() < expected {
            return Err(ObjectFileError::Truncated {
                expected,
                found: bytes.len(),
            });
        }

        Ok(ObjectFile {
            data_size,
            main_pc,
            code: bytes[HEADER_LEN..expected].to_vec(),
        })
    }

    pub fn to_postcard(&self) -> Result<Vec<u8>, ObjectFileError> {
        postcard::to_allocvec(self).map_err(|e| ObjectFileError::Postcard(e.to_string()))
    }

    pub fn from_postcard(bytes: &[u8]) -> Result<Self, ObjectFileError> {
        postcard::from_bytes(bytes).map_err(|e| ObjectFileError::Postcard(e.to_string()))
    }

    pub fn main_pc(&self) -> Option<usize> {
        usize::try_from(self.main_pc).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> ObjectFile {
        ObjectFile {
            data_size: 2,
            main_pc: 1,
            code: vec![58, 51, 0, 0, 52, 50],
        }
    }

    #[test]
    fn test_encode_layout() {
        let bytes = sample().encode();
        assert_eq!(
            bytes,
            vec![
                b'M', b'J', 0, 0, 0, 6, 0, 0, 0, 2, 0, 0, 0, 1, 58, 51, 0, 0, 52, 50
            ]
        );
        assert_eq!(ObjectFile::decode(&bytes), Ok(sample()));
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert_eq!(ObjectFile::decode(b"XX"), Err(ObjectFileError::BadMagic));
        assert_eq!(
            ObjectFile::decode(b"MJ\0\0"),
            Err(ObjectFileError::Truncated {
                expected: 14,
                found: 4
            })
        );

        let mut bytes = sample().encode();
        bytes.pop();
        assert_eq!(
            ObjectFile::decode(&bytes),
            Err(ObjectFileError::Truncated {
                expected: 20,
                found: 19
            })
        );
    }

    #[test]
    fn test_missing_main_is_minus_one() {
        let obj = ObjectFile {
            data_size: 0,
            main_pc: -1,
            code: vec![],
        };
        assert_eq!(obj.main_pc(), None);
        assert_eq!(ObjectFile::decode(&obj.encode()), Ok(obj));
    }

    #[test]
    fn test_postcard_image() {
        let obj = sample();
        let bytes = obj.to_postcard().unwrap();
        assert_eq!(ObjectFile::from_postcard(&bytes).unwrap(), obj);
        assert!(ObjectFile::from_postcard(&[0xff]).is_err());
    }
}
