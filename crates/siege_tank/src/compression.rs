//! Data formats and per-chunk decompression handling.

use std::fmt;
use std::io::Read;

use binrw::BinRead;
use flate2::read::ZlibDecoder;

use crate::error::CodecError;

/// Chunk sizes are expected to be rounded to this. A stray value is only
/// worth a warning, the retail data never violates it.
pub const CHUNK_SIZE_ALIGNMENT: u32 = 4;

/// Identifies the storage format of a file payload inside the Tank.
///
/// Individual chunks of a compressed payload may still be stored raw when
/// compression would not have paid off; that is signalled per chunk by equal
/// compressed and uncompressed sizes, not by this tag.
#[derive(BinRead, Debug, Copy, Clone, Default, PartialEq, Eq)]
#[br(repr = u16)]
pub enum DataFormat {
    /// Stores the data as it is
    #[default]
    Raw = 0,

    /// Compressed with Zlib
    Zlib = 1,

    /// Compressed with LZO. Recognized, but extraction is unsupported.
    Lzo = 2,
}

impl DataFormat {
    pub fn is_compressed(self) -> bool {
        self != DataFormat::Raw
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            DataFormat::Raw => "Raw",
            DataFormat::Zlib => "Zlib",
            DataFormat::Lzo => "Lzo",
        };
        f.write_str(name)
    }
}

/// Decompress one chunk's compressed stream.
///
/// `input` must hold exactly the compressed stream, without the trailing
/// extra bytes; those are restored verbatim by the caller. `expected_len`
/// is the chunk's declared uncompressed size, used to size the output
/// buffer up front.
pub(crate) fn decompress(
    format: DataFormat,
    input: &[u8],
    expected_len: usize,
) -> Result<Vec<u8>, CodecError> {
    match format {
        DataFormat::Raw => Ok(input.to_vec()),
        DataFormat::Zlib => {
            let mut output = Vec::with_capacity(expected_len);
            ZlibDecoder::new(input)
                .read_to_end(&mut output)
                .map_err(CodecError::Inflate)?;
            Ok(output)
        }
        DataFormat::Lzo => Err(CodecError::UnsupportedFormat(format)),
    }
}
