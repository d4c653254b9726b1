use crate::params::Params;
use anyhow::{ensure, Context, Result};
use auto_impl::auto_impl;
use byteorder::{LittleEndian, ReadBytesExt};
use rand::{CryptoRng, RngCore};
use sha3::{
    digest::{ExtendableOutput, Update, XofReader},
    Shake256,
};
use tracing::{debug, instrument};

/// Matrix is the n-by-m sumhash matrix A with elements in Z_q where q=2^64.
#[derive(Clone)]
pub struct Matrix {
    matrix: Vec<Vec<u64>>,
}

impl Matrix {
    /// random generates a random n x m matrix, m = compression_factor * n * 64, reading
    /// every element as 8 little-endian bytes from the random source.
    ///
    /// A source that runs dry aborts the generation; no partially filled matrix is returned.
    pub fn random<T: ReadBytesExt>(
        mut rand: T,
        n: usize,
        compression_factor: usize,
    ) -> Result<Self> {
        let params = Params::new(n, compression_factor);
        params.validate()?;
        let m = params.columns();

        let mut matrix = Vec::with_capacity(n);
        for i in 0..n {
            let mut row = Vec::with_capacity(m);
            for j in 0..m {
                let a = rand
                    .read_u64::<LittleEndian>()
                    .with_context(|| format!("entropy source exhausted at A[{}][{}]", i, j))?;
                row.push(a);
            }
            matrix.push(row);
        }

        debug!(n, m, "generated random matrix");
        Ok(Matrix { matrix })
    }

    /// random_from_rng generates a random matrix from a cryptographically secure rng,
    /// e.g. `rand::rngs::OsRng`.
    pub fn random_from_rng<R: RngCore + CryptoRng>(
        rng: &mut R,
        n: usize,
        compression_factor: usize,
    ) -> Result<Self> {
        Matrix::random(RngReader(rng), n, compression_factor)
    }

    /// from_seed creates a random-looking matrix from the seed bytes, expanded with SHAKE256.
    /// Both n and m have to fit in 16 bits since they are absorbed into the XOF.
    pub fn from_seed(seed: &[u8], n: usize, compression_factor: usize) -> Result<Self> {
        let params = Params::new(n, compression_factor);
        params.validate()?;
        let m = params.columns();
        ensure!(
            n <= u16::MAX as usize && m <= u16::MAX as usize,
            "matrix dimensions {}x{} do not fit the seed header",
            n,
            m
        );

        let mut xof = Shake256::default();
        xof.update(&64u16.to_le_bytes());
        xof.update(&(n as u16).to_le_bytes());
        xof.update(&(m as u16).to_le_bytes());
        xof.update(seed);

        Matrix::random(XofBytes(xof.finalize_xof()), n, compression_factor)
    }

    /// rows returns n.
    pub fn rows(&self) -> usize {
        self.matrix.len()
    }

    /// columns returns m.
    pub fn columns(&self) -> usize {
        self.matrix[0].len()
    }

    /// lookup_table generates a lookuptable used to increase hash calculation performance.
    #[instrument(skip_all, level = "debug")]
    pub fn lookup_table(&self) -> LookupTable {
        let n = self.rows();
        let m = self.columns();

        let lookup_table: Vec<Vec<[u64; 256]>> = self
            .matrix
            .iter()
            .map(|row| {
                row.chunks_exact(8)
                    .map(|group| {
                        let mut sums = [0u64; 256];
                        sums.iter_mut()
                            .enumerate()
                            .for_each(|(b, sum)| *sum = sum_bits(group, b as u8));
                        sums
                    })
                    .collect::<Vec<_>>()
            })
            .collect();

        debug!(n, groups = m / 8, "derived lookup table");
        LookupTable { lookup_table }
    }
}

// mask returns all ones if the lowest bit of b is set, zero otherwise.
#[inline(always)]
fn mask(b: u8) -> u64 {
    -i64::from(b & 1) as u64
}

// sum_bits adds up a[p] for every bit p of b that is set, counting from the most
// significant bit. It is the unrolled form of
//
//   for p in 0..8 {
//     if (b << p) & 0x80 != 0 {
//       x += a[p]
//     }
//   }
fn sum_bits(a: &[u64], b: u8) -> u64 {
    let a0 = a[0] & mask(b >> 7);
    let a1 = a[1] & mask(b >> 6);
    let a2 = a[2] & mask(b >> 5);
    let a3 = a[3] & mask(b >> 4);
    let a4 = a[4] & mask(b >> 3);
    let a5 = a[5] & mask(b >> 2);
    let a6 = a[6] & mask(b >> 1);
    let a7 = a[7] & mask(b);

    a0.wrapping_add(a1)
        .wrapping_add(a2)
        .wrapping_add(a3)
        .wrapping_add(a4)
        .wrapping_add(a5)
        .wrapping_add(a6)
        .wrapping_add(a7)
}

// RngReader exposes a fallible rng as a byte reader.
struct RngReader<'a, R>(&'a mut R);

impl<R: RngCore> std::io::Read for RngReader<'_, R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0
            .try_fill_bytes(buf)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
        Ok(buf.len())
    }
}

// XofBytes exposes an infinite XOF stream as a byte reader.
struct XofBytes<X>(X);

impl<X: XofReader> std::io::Read for XofBytes<X> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.0.read(buf);
        Ok(buf.len())
    }
}

/// LookupTable is the precomputed sums from a matrix for every possible byte of input.
/// Its dimensions are [n][m/8][256]u64.
#[derive(Clone)]
pub struct LookupTable {
    lookup_table: Vec<Vec<[u64; 256]>>,
}

/// Compressor represents the compression function which is performed on a message.
#[auto_impl(&, &mut, Box, Rc, Arc)]
pub trait Compressor {
    /// compress performs the compression algorithm on msg and writes the output words into dst.
    ///
    /// Panics if msg is not exactly `input_len()` bytes or dst is shorter than `output_len()`.
    fn compress(&self, dst: &mut [u64], msg: &[u8]);
    /// input_len returns the valid length of a message in bytes.
    fn input_len(&self) -> usize; // len(msg)
    /// output_len returns the number of 64-bit words written by the compression function.
    fn output_len(&self) -> usize; // len(dst)
}

fn check_lengths<C: Compressor + ?Sized>(c: &C, dst: &[u64], msg: &[u8]) {
    if msg.len() != c.input_len() {
        panic!(
            "could not compress message. input size is wrong. size is {:?}, expected {:?}",
            msg.len(),
            c.input_len()
        );
    }
    if dst.len() < c.output_len() {
        panic!(
            "could not compress message. output buffer too short. size is {:?}, expected {:?}",
            dst.len(),
            c.output_len()
        );
    }
}

impl Compressor for Matrix {
    fn input_len(&self) -> usize {
        self.columns() / 8
    }

    fn output_len(&self) -> usize {
        self.rows()
    }

    fn compress(&self, dst: &mut [u64], msg: &[u8]) {
        check_lengths(self, dst, msg);

        self.matrix.iter().zip(dst.iter_mut()).for_each(|(row, d)| {
            let mut x = 0u64;
            msg.iter().enumerate().for_each(|(j, &byte)| {
                // bit b of the byte, most significant first, selects column 8j+b
                (0..8).for_each(|b| {
                    x = x.wrapping_add(row[8 * j + b] & mask((byte << b) >> 7));
                });
            });
            *d = x;
        });
    }
}

impl Compressor for LookupTable {
    fn input_len(&self) -> usize {
        self.lookup_table[0].len()
    }

    fn output_len(&self) -> usize {
        self.lookup_table.len()
    }

    fn compress(&self, dst: &mut [u64], msg: &[u8]) {
        check_lengths(self, dst, msg);

        self.lookup_table
            .iter()
            .zip(dst.iter_mut())
            .for_each(|(row, d)| {
                *d = row
                    .iter()
                    .zip(msg)
                    .fold(0u64, |x, (sums, &byte)| x.wrapping_add(sums[byte as usize]));
            });
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use proptest::prelude::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn xof() -> impl std::io::Read {
        XofBytes(Shake256::default().finalize_xof())
    }

    #[test]
    fn compression() {
        const N: usize = 14;
        const M: usize = N * 64 * 2;

        let a = Matrix::random(xof(), N, 2).unwrap();
        let at = a.lookup_table();

        assert_eq!(a.input_len(), M / 8, "unexpected input len (A)");
        assert_eq!(at.input_len(), M / 8, "unexpected input len (At)");
        assert_eq!(a.output_len(), N, "unexpected output len (A)");
        assert_eq!(at.output_len(), N, "unexpected output len (At)");

        let mut dst1 = vec![0u64; a.output_len()];
        let mut dst2 = vec![0u64; a.output_len()];

        (0..1000).for_each(|_| {
            let msg: Vec<u8> = (0..a.input_len()).map(|_| rand::random::<u8>()).collect();
            a.compress(&mut dst1, &msg);
            at.compress(&mut dst2, &msg);

            assert_eq!(dst1, dst2, "matrix and lookup table outputs are different");
        });
    }

    #[test]
    fn most_significant_bit_first() {
        let a = Matrix::random(xof(), 2, 1).unwrap();
        let at = a.lookup_table();
        let mut msg = vec![0u8; a.input_len()];
        let mut dst = vec![0u64; 2];

        a.compress(&mut dst, &msg);
        assert_eq!(dst, vec![0, 0]);

        // 0x80 in byte 3 selects column 24, 0x01 selects column 31
        msg[3] = 0x80;
        a.compress(&mut dst, &msg);
        assert_eq!(dst, vec![a.matrix[0][24], a.matrix[1][24]]);

        msg[3] = 0x81;
        a.compress(&mut dst, &msg);
        assert_eq!(
            dst,
            vec![
                a.matrix[0][24].wrapping_add(a.matrix[0][31]),
                a.matrix[1][24].wrapping_add(a.matrix[1][31]),
            ]
        );

        assert_eq!(at.lookup_table[1][3][0x81], dst[1]);
    }

    #[test]
    fn sums_wrap_around() {
        let a = Matrix {
            matrix: vec![vec![u64::MAX; 64]],
        };
        let mut dst = [0u64; 1];
        let mut msg = [0u8; 8];
        msg[0] = 0xc0;
        a.compress(&mut dst, &msg);
        assert_eq!(dst[0], u64::MAX - 1);

        a.lookup_table().compress(&mut dst, &[0xff; 8]);
        assert_eq!(dst[0], 0u64.wrapping_sub(64));
    }

    #[test]
    fn longer_destination_is_accepted() {
        let a = Matrix::random(xof(), 3, 1).unwrap();
        let mut dst = vec![7u64; 5];
        a.compress(&mut dst, &vec![0xff; a.input_len()]);
        assert_eq!(dst[3..], [7, 7]);
    }

    #[test]
    #[should_panic(expected = "input size is wrong")]
    fn short_message_panics() {
        let a = Matrix::random(xof(), 3, 1).unwrap();
        let mut dst = vec![0u64; 3];
        a.compress(&mut dst, &vec![0; a.input_len() - 1]);
    }

    #[test]
    #[should_panic(expected = "output buffer too short")]
    fn short_destination_panics() {
        let at = Matrix::random(xof(), 3, 1).unwrap().lookup_table();
        let mut dst = vec![0u64; 2];
        at.compress(&mut dst, &vec![0; at.input_len()]);
    }

    #[test]
    fn exhausted_entropy_fails() {
        // one byte short of 2 rows of 128 words
        let bytes = vec![0xab; 2 * 128 * 8 - 1];
        let err = Matrix::random(&bytes[..], 2, 1).err().unwrap();
        assert!(
            format!("{:#}", err).contains("A[1][127]"),
            "unexpected error: {:#}",
            err
        );
    }

    #[test]
    fn random_reads_little_endian() {
        let bytes: Vec<u8> = (0..64u64).flat_map(|x| (x << 56 | x).to_le_bytes()).collect();
        let a = Matrix::random(&bytes[..], 1, 1).unwrap();
        assert_eq!(a.rows(), 1);
        assert_eq!(a.columns(), 64);
        assert_eq!(a.matrix[0][5], 5 << 56 | 5);
    }

    #[test]
    fn random_from_rng() {
        let mut rng = StdRng::seed_from_u64(1);
        let a = Matrix::random_from_rng(&mut rng, 4, 2).unwrap();
        assert_eq!((a.rows(), a.columns()), (4, 512));

        let mut rng = StdRng::seed_from_u64(1);
        let b = Matrix::random_from_rng(&mut rng, 4, 2).unwrap();
        assert_eq!(a.matrix, b.matrix);
    }

    #[test]
    fn from_seed() {
        let a = Matrix::from_seed(b"seed", 4, 2).unwrap();
        let b = Matrix::from_seed(b"seed", 4, 2).unwrap();
        let c = Matrix::from_seed(b"other seed", 4, 2).unwrap();
        assert_eq!(a.matrix, b.matrix);
        assert_ne!(a.matrix, c.matrix);

        assert!(Matrix::from_seed(b"seed", 512, 2).is_err());
        assert!(Matrix::from_seed(b"seed", 0, 2).is_err());
    }

    proptest! {
        #[test]
        fn lookup_table_matches_matrix(seed in any::<u64>(), msg in prop::collection::vec(any::<u8>(), 64)) {
            let mut rng = StdRng::seed_from_u64(seed);
            let a = Matrix::random_from_rng(&mut rng, 4, 2).unwrap();
            let at = a.lookup_table();

            let mut dst1 = [0u64; 4];
            let mut dst2 = [0u64; 4];
            a.compress(&mut dst1, &msg);
            at.compress(&mut dst2, &msg);
            prop_assert_eq!(dst1, dst2);
        }
    }
}
