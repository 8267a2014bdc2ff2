use olap_error::OlapResult;
use olap_io::ReadAt;

use crate::index::{PositionProvider, PositionRecorder};
use crate::stream::{InStream, OutStream};

/// Packs booleans eight to a byte, most significant bit first.
#[derive(Debug)]
pub struct BitFieldWriter {
    stream: OutStream,
    current: u8,
    bits_used: u8,
}

impl BitFieldWriter {
    pub fn new(stream: OutStream) -> Self {
        Self {
            stream,
            current: 0,
            bits_used: 0,
        }
    }

    pub fn write(&mut self, bit: bool) -> OlapResult<()> {
        if bit {
            self.current |= 0x80 >> self.bits_used;
        }
        self.bits_used += 1;
        if self.bits_used == 8 {
            self.stream.write_byte(self.current)?;
            self.current = 0;
            self.bits_used = 0;
        }
        Ok(())
    }

    /// Record the byte position of the partially filled byte and the number of bits in it.
    pub fn record_position(&self, recorder: &mut impl PositionRecorder) {
        self.stream.record_position(recorder);
        recorder.add_position(u64::from(self.bits_used));
    }

    /// Write out a partially filled byte and flush the underlying stream.
    pub fn flush(&mut self) -> OlapResult<()> {
        if self.bits_used > 0 {
            self.stream.write_byte(self.current)?;
            self.current = 0;
            self.bits_used = 0;
        }
        self.stream.flush()
    }

    pub fn stream_mut(&mut self) -> &mut OutStream {
        &mut self.stream
    }

    pub fn into_stream(self) -> OutStream {
        self.stream
    }
}

/// Reads booleans written by [`BitFieldWriter`].
pub struct BitFieldReader<R> {
    stream: InStream<R>,
    current: u8,
    bits_left: u8,
}

impl<R: ReadAt> BitFieldReader<R> {
    pub fn new(stream: InStream<R>) -> Self {
        Self {
            stream,
            current: 0,
            bits_left: 0,
        }
    }

    pub fn next_bit(&mut self) -> OlapResult<bool> {
        if self.bits_left == 0 {
            self.current = self.stream.read_byte()?;
            self.bits_left = 8;
        }
        self.bits_left -= 1;
        Ok((self.current >> self.bits_left) & 1 == 1)
    }

    /// Skip `n` bits and return how many of them were set.
    pub fn skip(&mut self, n: u64) -> OlapResult<u64> {
        let mut set = 0;
        for _ in 0..n {
            set += u64::from(self.next_bit()?);
        }
        Ok(set)
    }

    pub fn seek(&mut self, provider: &mut PositionProvider<'_>) -> OlapResult<()> {
        self.stream.seek(provider)?;
        let consumed = provider.next_position()?;
        if consumed == 0 {
            self.bits_left = 0;
        } else {
            self.current = self.stream.read_byte()?;
            self.bits_left = 8u8.saturating_sub(u8::try_from(consumed).unwrap_or(u8::MAX));
        }
        Ok(())
    }
}
