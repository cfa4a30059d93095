use crate::core::error::{Error, ErrorKind, Result};
use serde::{Serialize, Deserialize};

/// Compressed block storage for document field data
#[derive(Debug, Serialize, Deserialize)]
pub struct CompressedBlock {
    pub data: Vec<u8>,
    pub original_size: usize,
    pub compression: CompressionType,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionType {
    None,
    Lz4,      // Fast compression, ratio 2-3x
    Zstd,     // Better ratio, slower
    Snappy,   // Balanced
}

impl CompressedBlock {
    pub fn compress(data: &[u8], compression: CompressionType) -> Result<Self> {
        let compressed = match compression {
            CompressionType::None => data.to_vec(),

            CompressionType::Lz4 => {
                lz4::block::compress(data, None, false)?
            }

            CompressionType::Zstd => {
                zstd::encode_all(data, 3)?  // Level 3 is balanced
            }

            CompressionType::Snappy => {
                use snap::raw::Encoder;
                let mut encoder = Encoder::new();
                encoder.compress_vec(data)
                    .map_err(|e| Error::new(ErrorKind::Io, e.to_string()))?
            }
        };

        Ok(CompressedBlock {
            data: compressed,
            original_size: data.len(),
            compression,
        })
    }

    pub fn decompress(&self) -> Result<Vec<u8>> {
        match self.compression {
            CompressionType::None => Ok(self.data.clone()),

            CompressionType::Lz4 => {
                lz4::block::decompress(&self.data, Some(self.original_size as i32))
                    .map_err(|e| Error::new(ErrorKind::Io, e.to_string()))
            }

            CompressionType::Zstd => {
                zstd::decode_all(&self.data[..])
                    .map_err(|e| Error::new(ErrorKind::Io, e.to_string()))
            }

            CompressionType::Snappy => {
                use snap::raw::Decoder;
                let mut decoder = Decoder::new();
                decoder.decompress_vec(&self.data)
                    .map_err(|e| Error::new(ErrorKind::Io, e.to_string()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compressed_block_restores_input() {
        let data = b"the quick brown fox jumps over the lazy dog, twice over";
        for compression in [
            CompressionType::None,
            CompressionType::Lz4,
            CompressionType::Zstd,
            CompressionType::Snappy,
        ] {
            let block = CompressedBlock::compress(data, compression).unwrap();
            assert_eq!(block.decompress().unwrap(), data);
        }
    }
}
