use crate::compress::{LookupTable, Matrix};
use crate::params::{Params, SUMHASH512};
use crate::sumhash::Digest;
use once_cell::sync::Lazy;

/// The size in bytes of the sumhash512 checksum.
pub const DIGEST_SIZE: usize = SUMHASH512.digest_size();

/// Block size, in bytes, of the sumhash512 hash function.
pub const DIGEST_BLOCK_SIZE: usize = SUMHASH512.block_size();

/// Parameters of the sumhash512 matrix.
pub const PARAMS: Params = SUMHASH512;

/// Seed the sumhash512 matrix is expanded from.
pub const SEED: &[u8] = b"sumhash";

static LOOKUP_TABLE: Lazy<LookupTable> = Lazy::new(|| {
    Matrix::from_seed(SEED, PARAMS.rows, PARAMS.compression_factor)
        .expect("sumhash512 parameters fit the seed header")
        .lookup_table()
});

/// lookup_table returns the sumhash512 lookup table. It is built on first use and
/// shared by every sumhash512 digest in the process.
pub fn lookup_table() -> &'static LookupTable {
    &LOOKUP_TABLE
}

/// new creates a sumhash512 context. The output of the hash function is 64 bytes (512 bits).
pub fn new() -> Digest<&'static LookupTable> {
    Digest::new(lookup_table()).expect("sumhash512 compressor has a 64 byte block")
}
