//! The Equihash Proof-of-Work function: a bucketed Wagner-style solver and
//! the matching solution verifier.
//!
//! [`Solver`] enumerates the BLAKE2b leaf hashes for a seeded header and
//! nonce and searches for binary trees of 2^K distinct indices whose hashes
//! XOR to zero under the Wagner conditions. [`is_valid_solution`] checks a
//! minimal-encoded proof against the same rules.
//!
//! ```no_run
//! use equihash_solver::{Options, Solver};
//!
//! let mut solver = Solver::new(200, 9, Options::default()).unwrap();
//! solver.set_header(&[0u8; 108], 1);
//! let result = solver.solve();
//! for proof in &result.solutions {
//!     let minimal = equihash_solver::minimal_from_indices(200, 9, proof).unwrap();
//!     let nonce = {
//!         let mut bytes = [0u8; 32];
//!         bytes[..4].copy_from_slice(&1u32.to_le_bytes());
//!         bytes
//!     };
//!     equihash_solver::is_valid_solution(200, 9, &[0u8; 108], &nonce, &minimal).unwrap();
//! }
//! ```

mod blake2b;
mod minimal;
mod params;
mod solver;
mod verify;

#[cfg(test)]
mod test_vectors;

pub use solver::{Options, PairIndex, SolveResult, SolveStats, Solver, SolverError};
pub use verify::{is_valid_solution, Error};

/// Unpacks a minimal-encoded solution into its index list.
///
/// Returns `None` for invalid parameters or a length mismatch.
pub fn indices_from_minimal(n: u32, k: u32, minimal: &[u8]) -> Option<Vec<u32>> {
    let p = params::Params::new(n, k)?;
    minimal::indices_from_minimal(p, minimal)
}

/// Packs an index list into the canonical minimal encoding.
///
/// Returns `None` for invalid parameters, a wrong index count, or an index
/// that does not fit `n/(k+1) + 1` bits.
pub fn minimal_from_indices(n: u32, k: u32, indices: &[u32]) -> Option<Vec<u8>> {
    let p = params::Params::new(n, k)?;
    minimal::minimal_from_indices(p, indices)
}
