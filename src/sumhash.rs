use crate::compress::Compressor;
use anyhow::{ensure, Result};
use byteorder::{ByteOrder, LittleEndian};
use tracing::debug;

/// Digest is a Merkle-Damgård streaming hash over any compressor.
///
/// Every compression takes the current chaining value followed by one message block,
/// so the block size is the compressor input length minus the digest size.
// digest implementation is based on https://cs.opensource.google/go/go/+/refs/tags/go1.16.6:src/crypto/sha256/sha256.go
#[derive(Clone)]
pub struct Digest<C: Compressor> {
    c: C,
    size: usize,       // number of bytes in a hash output
    block_size: usize, // number of bytes in an input block, per compression

    h: Vec<u64>, // hash chain (from last compression, or IV)
    x: Vec<u8>,  // data written since last compression
    nx: usize,   // number of input bytes written since last compression
    len: u64,    // total number of input bytes written overall
}

impl<C: Compressor> Digest<C> {
    /// new returns a Digest computing a sumhash checksum with the compressor c.
    /// The compressor must leave at least 8 bytes of every input for message data.
    pub fn new(c: C) -> Result<Digest<C>> {
        let output_len = c.output_len();
        let input_len = c.input_len();
        let size = output_len * 8;
        ensure!(
            input_len >= size + 8,
            "compressor input of {} bytes leaves no room for message blocks after a {} byte chaining value",
            input_len,
            size
        );

        let block_size = input_len - size;
        debug!(size, block_size, "new digest");

        Ok(Digest {
            c,
            size,
            block_size,

            h: vec![0; output_len],
            x: vec![0; block_size],
            nx: 0,
            len: 0,
        })
    }

    /// reset restores the initial (all-zero) chaining value and forgets all written input.
    pub fn reset(&mut self) {
        self.h.iter_mut().for_each(|a| *a = 0);
        self.nx = 0;
        self.len = 0;
    }

    /// size returns the number of bytes of the digest.
    pub fn size(&self) -> usize {
        self.size
    }

    /// block_size returns the number of message bytes absorbed per compression.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// update absorbs p into the hash state.
    pub fn update(&mut self, mut p: &[u8]) {
        let nn = p.len();

        // Check if the new length (in bits) overflows our counter capacity.
        if nn as u64 >= (1 << 61) - self.len {
            panic!(
                "length overflow: already wrote {} bytes, trying to write {} bytes",
                self.len, nn
            );
        }

        self.len += nn as u64;
        if self.nx > 0 {
            // continue with existing buffer, if nonempty
            let n = p.len().min(self.block_size - self.nx);
            self.x[self.nx..self.nx + n].copy_from_slice(&p[..n]);

            self.nx += n;
            if self.nx == self.block_size {
                blocks(&self.c, &mut self.h, &self.x);
                self.nx = 0
            }
            p = &p[n..];
        }

        if p.len() >= self.block_size {
            // handle any remaining full input blocks
            let n = p.len() / self.block_size * self.block_size;
            blocks(&self.c, &mut self.h, &p[..n]);
            p = &p[n..];
        }
        if !p.is_empty() {
            // handle any remaining input
            self.x[..p.len()].copy_from_slice(p);
            self.nx = p.len();
        }
    }

    // copy snapshots the state while borrowing the compressor, which may be a large table.
    fn copy(&self) -> Digest<&C> {
        Digest {
            c: &self.c,
            size: self.size,
            block_size: self.block_size,
            h: self.h.clone(),
            x: self.x.clone(),
            nx: self.nx,
            len: self.len,
        }
    }

    /// finalize returns the digest of everything written so far.
    /// The state is left untouched, so the caller can keep writing and summing.
    pub fn finalize(&self) -> Vec<u8> {
        self.copy().check_sum()
    }

    /// sum appends the digest to iin and returns the resulting buffer.
    pub fn sum(&self, mut iin: Vec<u8>) -> Vec<u8> {
        iin.extend(self.finalize());
        iin
    }

    fn check_sum(mut self) -> Vec<u8> {
        let b = self.block_size as u64;
        let p = b - 8;

        let bitlen = self.len << 3; // number of input bits written

        // Padding. Add a 1 bit and 0 bits until P bytes mod B.
        let mut tmp = vec![0; self.block_size];
        tmp[0] = 0x80;
        let r = self.len % b;
        if r < p {
            self.update(&tmp[0..(p - r) as usize]);
        } else {
            self.update(&tmp[0..(b + p - r) as usize]);
        }

        // Length in bits, 64-bit little endian.
        LittleEndian::write_u64(&mut tmp[0..8], bitlen);
        self.update(&tmp[0..8]);

        if self.nx != 0 {
            // buffer must be empty now
            panic!("d.nx != 0")
        }

        let mut digest = vec![0u8; self.size];
        LittleEndian::write_u64_into(&self.h, &mut digest);
        digest
    }
}

// blocks hashes full blocks of data. len(data) must be a multiple of the block size.
fn blocks<C: Compressor>(c: &C, h: &mut [u64], data: &[u8]) {
    let size = h.len() * 8;
    let mut cin = vec![0u8; c.input_len()];

    data.chunks_exact(c.input_len() - size).for_each(|block| {
        LittleEndian::write_u64_into(h, &mut cin[..size]);
        cin[size..].copy_from_slice(block);

        c.compress(h, &cin);
    })
}

impl<C: Compressor> std::io::Write for Digest<C> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<C: Compressor> digest::Update for Digest<C> {
    fn update(&mut self, data: &[u8]) {
        Digest::update(self, data)
    }
}

impl<C: Compressor> digest::Reset for Digest<C> {
    fn reset(&mut self) {
        Digest::reset(self)
    }
}
