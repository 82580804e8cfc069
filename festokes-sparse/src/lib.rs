//! Sparse direct solvers for the saddle-point systems arising in `festokes`.
//!
//! The crate provides two building blocks:
//!
//! - [`ordering`]: index permutations and a geometric nested dissection ordering that keeps
//!   fill-in of sparse factorizations of finite element matrices low.
//! - [`ldl`]: an up-looking sparse $LDL^T$ factorization for symmetric quasi-definite matrices,
//!   i.e. matrices of the form
//!   $$ \begin{pmatrix} A & B^T \\\\ B & -C \end{pmatrix} $$
//!   with $A$ and $C$ positive definite, for which the factorization exists for any
//!   symmetric permutation.

pub mod ldl;
pub mod ordering;

pub use ldl::{LdlError, LdlFactorization};
pub use ordering::{nested_dissection, InvalidPermutation, Permutation};
