use anyhow::{ensure, Context, Result};

/// Params fixes the shape of a sumhash matrix: `rows` (n) and the compression factor,
/// from which the column count m = compression_factor * n * 64 follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Params {
    /// Number of matrix rows, which is also the number of 64-bit output words.
    pub rows: usize,
    /// Ratio between the compressor's input and output length.
    pub compression_factor: usize,
}

/// Parameters of the sumhash512 instance: 8 rows and a compression factor of 2,
/// giving a 64-byte digest and a 64-byte message block.
pub const SUMHASH512: Params = Params::new(8, 2);

impl Params {
    /// new creates a parameter set. It is not validated until `validate` is called.
    pub const fn new(rows: usize, compression_factor: usize) -> Self {
        Params {
            rows,
            compression_factor,
        }
    }

    /// columns returns m, the number of matrix columns (one per input bit).
    pub const fn columns(&self) -> usize {
        self.compression_factor * self.rows * 64
    }

    /// input_len returns the compressor input length in bytes.
    pub const fn input_len(&self) -> usize {
        self.columns() / 8
    }

    /// output_len returns the compressor output length in 64-bit words.
    pub const fn output_len(&self) -> usize {
        self.rows
    }

    /// digest_size returns the size in bytes of the chaining value and of the digest.
    pub const fn digest_size(&self) -> usize {
        self.rows * 8
    }

    /// block_size returns the number of message bytes absorbed per compression.
    pub const fn block_size(&self) -> usize {
        self.input_len() - self.digest_size()
    }

    /// validate checks that a matrix with these parameters can be built.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.rows > 0, "rows must be positive");
        ensure!(
            self.compression_factor > 0,
            "compression factor must be positive"
        );
        self.compression_factor
            .checked_mul(self.rows)
            .and_then(|x| x.checked_mul(64))
            .and_then(|m| m.checked_mul(self.rows))
            .with_context(|| format!("matrix size overflows for {:?}", self))?;
        Ok(())
    }

    /// validate_for_digest additionally checks that a compressor with these parameters
    /// leaves room for at least the 8-byte length field in every message block.
    pub fn validate_for_digest(&self) -> Result<()> {
        self.validate()?;
        ensure!(
            self.compression_factor > 1,
            "compression factor {} leaves no room for message bytes",
            self.compression_factor
        );
        Ok(())
    }
}

#[cfg(test)]
pub mod test {
    use super::*;

    #[test]
    fn sizes() {
        let p = Params::new(14, 4);
        assert_eq!(p.columns(), 14 * 64 * 4);
        assert_eq!(p.input_len(), 14 * 64 * 4 / 8);
        assert_eq!(p.output_len(), 14);
        assert_eq!(p.digest_size(), 112);
        assert_eq!(p.block_size(), 448 - 112);
    }

    #[test]
    fn sumhash512_sizes() {
        assert_eq!(SUMHASH512.columns(), 1024);
        assert_eq!(SUMHASH512.input_len(), 128);
        assert_eq!(SUMHASH512.digest_size(), 64);
        assert_eq!(SUMHASH512.block_size(), 64);
        assert!(SUMHASH512.validate_for_digest().is_ok());
    }

    #[test]
    fn rejects_degenerate() {
        assert!(Params::new(0, 2).validate().is_err());
        assert!(Params::new(4, 0).validate().is_err());
        assert!(Params::new(usize::MAX, 2).validate().is_err());

        // a valid compressor, but every input byte is taken by the chaining value
        assert!(Params::new(4, 1).validate().is_ok());
        assert!(Params::new(4, 1).validate_for_digest().is_err());
    }
}
