use std::fmt;

use anyhow::{ensure, Result};
use byteorder::{ByteOrder, LittleEndian};
use digest::{
    block_buffer::Eager,
    core_api::{AlgorithmName, Buffer, BufferKindUser, CoreWrapper, FixedOutputCore, UpdateCore},
    crypto_common::{Block, BlockSizeUser},
    typenum::U64,
    HashMarker, Output, OutputSizeUser, Reset,
};

use crate::compress::{Compressor, LookupTable};
use crate::sumhash512::{self, DIGEST_BLOCK_SIZE, DIGEST_SIZE};

const WORDS: usize = DIGEST_SIZE / 8;

/// Sumhash512 is the sumhash512 hasher for the RustCrypto `digest` traits,
/// backed by the process-wide sumhash512 lookup table.
pub type Sumhash512 = CoreWrapper<Sumhash512Core<&'static LookupTable>>;

/// Sumhash512Core returns a core implementation for sumhash cryptographic hash function.
#[derive(Clone)]
pub struct Sumhash512Core<C: Compressor> {
    c: C,
    h: [u64; WORDS], // hash chain (from last compression, or IV)
    len: u64,
}

impl<C: Compressor> Sumhash512Core<C> {
    /// new wraps a compressor taking 128 bytes to 8 words, e.g. a matrix built
    /// with `sumhash512::PARAMS`.
    pub fn new(c: C) -> Result<Self> {
        ensure!(
            c.input_len() == DIGEST_SIZE + DIGEST_BLOCK_SIZE && c.output_len() == WORDS,
            "compressor maps {} bytes to {} words, want {} bytes to {} words",
            c.input_len(),
            c.output_len(),
            DIGEST_SIZE + DIGEST_BLOCK_SIZE,
            WORDS
        );
        Ok(Self {
            c,
            h: [0; WORDS],
            len: 0,
        })
    }

    fn compress_block(&mut self, data: &[u8]) {
        let mut cin = [0; DIGEST_SIZE + DIGEST_BLOCK_SIZE];
        self.len += data.len() as u64;

        LittleEndian::write_u64_into(&self.h, &mut cin[..DIGEST_SIZE]);
        cin[DIGEST_SIZE..].copy_from_slice(data);

        self.c.compress(&mut self.h, &cin);
    }
}

impl Default for Sumhash512Core<&'static LookupTable> {
    fn default() -> Self {
        Self {
            c: sumhash512::lookup_table(),
            h: [0; WORDS],
            len: 0,
        }
    }
}

impl<C: Compressor> Reset for Sumhash512Core<C> {
    fn reset(&mut self) {
        self.h = [0; WORDS];
        self.len = 0;
    }
}

impl<C: Compressor> HashMarker for Sumhash512Core<C> {}

impl<C: Compressor> BlockSizeUser for Sumhash512Core<C> {
    type BlockSize = U64;
}

impl<C: Compressor> BufferKindUser for Sumhash512Core<C> {
    type BufferKind = Eager;
}

impl<C: Compressor> OutputSizeUser for Sumhash512Core<C> {
    type OutputSize = U64;
}

impl<C: Compressor> FixedOutputCore for Sumhash512Core<C> {
    fn finalize_fixed_core(&mut self, buffer: &mut Buffer<Self>, out: &mut Output<Self>) {
        let bitlen = (self.len + buffer.get_pos() as u64) << 3; // number of input bits written
        buffer.digest_pad(0x80, &bitlen.to_le_bytes(), |b| self.compress_block(b));

        LittleEndian::write_u64_into(&self.h, out);
    }
}

impl<C: Compressor> UpdateCore for Sumhash512Core<C> {
    fn update_blocks(&mut self, blocks: &[Block<Self>]) {
        for b in blocks {
            self.compress_block(b)
        }
    }
}

impl<C: Compressor> AlgorithmName for Sumhash512Core<C> {
    fn write_alg_name(f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sumhash512")
    }
}

impl<C: Compressor> fmt::Debug for Sumhash512Core<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Sumhash512Core { ... }")
    }
}
