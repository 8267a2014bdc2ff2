use std::fmt::Debug;
use std::sync::Arc;

use olap_error::{OlapResult, olap_bail, olap_err};

use crate::proto::CompressionKind;

/// A block compressor applied to each stream chunk independently.
pub trait Compressor: Debug + Send + Sync {
    fn kind(&self) -> CompressionKind;

    /// Compress `input` and append the result to `out`.
    fn compress(&self, input: &[u8], out: &mut Vec<u8>) -> OlapResult<()>;

    /// Decompress `input` into `out`, replacing its contents. Fails if the decompressed chunk
    /// would be larger than `max_len`.
    fn decompress(&self, input: &[u8], out: &mut Vec<u8>, max_len: usize) -> OlapResult<()>;
}

/// LZ4 block compression; each compressed chunk is prefixed with its little-endian `u32`
/// uncompressed size.
#[derive(Debug, Default, Clone, Copy)]
pub struct Lz4Compressor;

const SIZE_PREFIX_LEN: usize = size_of::<u32>();

impl Compressor for Lz4Compressor {
    fn kind(&self) -> CompressionKind {
        CompressionKind::Lz4
    }

    fn compress(&self, input: &[u8], out: &mut Vec<u8>) -> OlapResult<()> {
        out.extend_from_slice(&lz4_flex::block::compress_prepend_size(input));
        Ok(())
    }

    fn decompress(&self, input: &[u8], out: &mut Vec<u8>, max_len: usize) -> OlapResult<()> {
        let Some((size, payload)) = input.split_first_chunk::<SIZE_PREFIX_LEN>() else {
            olap_bail!(DecodeError: "lz4 chunk of {} bytes has no size prefix", input.len());
        };
        let size = u32::from_le_bytes(*size) as usize;
        if size > max_len {
            olap_bail!(
                DecodeError: "lz4 chunk claims {} bytes, chunks hold at most {}",
                size,
                max_len
            );
        }
        out.clear();
        out.resize(size, 0);
        let written = lz4_flex::block::decompress_into(payload, out)
            .map_err(|e| olap_err!(DecodeError: "lz4 decompression failed: {}", e))?;
        if written != size {
            olap_bail!(
                DecodeError: "lz4 chunk decompressed to {} bytes, expected {}",
                written,
                size
            );
        }
        Ok(())
    }
}

impl CompressionKind {
    /// The compressor for this kind; `None` stores chunks raw.
    pub fn compressor(self) -> Option<Arc<dyn Compressor>> {
        match self {
            CompressionKind::None => None,
            CompressionKind::Lz4 => Some(Arc::new(Lz4Compressor)),
        }
    }
}
