#![warn(missing_docs)]
//! A Rust implementation of a subset-sum hash function over Z_{2^64}.
//!
//! The compression function multiplies the input bits by a random n x m matrix
//! (a subset sum of matrix columns, mod 2^64). It comes in two interchangeable forms,
//! the [`Matrix`] itself and the precomputed [`LookupTable`], which produce identical
//! output. [`Digest`] turns either of them into a streaming hash using the
//! Merkle-Damgård construction.
//!
//! # Example
//! ```
//! use lattice_sumhash::sumhash512;
//!
//! let mut h = sumhash512::new();
//! h.update("hello world".as_bytes());
//! let output = h.finalize();
//! println!("Result: {}", hex::encode(&output));
//! ```
//!
//! Any compressor can drive a digest, for instance a matrix drawn from the OS rng:
//! ```
//! use lattice_sumhash::{Digest, Matrix};
//! use anyhow::Result;
//!
//! fn main() -> Result<()> {
//!   let a = Matrix::random_from_rng(&mut rand::rngs::OsRng, 4, 2)?;
//!   let mut h = Digest::new(a.lookup_table())?;
//!   h.update(b"hello world");
//!   assert_eq!(h.finalize().len(), 32);
//!   Ok(())
//! }
//! ```

/// `compress` represents the compression function which is performed on a message.
pub mod compress;
/// `params` describes the shape of a sumhash matrix and the sizes derived from it.
pub mod params;
/// `sumhash` is a subset-sum hash.
pub mod sumhash;
/// `sumhash512` is a subset-sum hash variant with an output of 64 bytes (512 bits).
pub mod sumhash512;
/// `sumhash512core` exposes sumhash512 through the block-level API of the `digest` crate.
pub mod sumhash512core;

pub use compress::{Compressor, LookupTable, Matrix};
pub use params::Params;
pub use sumhash::Digest;
pub use sumhash512core::Sumhash512;
