//! # QWick: symbolic Wick's theorem for quantum chemistry
//!
//! QWick is a program for the derivation of working equations of many-body quantum-chemical
//! methods by symbolic manipulation of second-quantised operator strings, written in Rust with
//! the following capabilities:
//! - normal ordering of fermionic and spin-free (spin-summed) operator strings by explicit
//!   enumeration of Wick contractions with fermionic sign bookkeeping,
//! - canonicalisation of terms up to the relabelling of dummy indices, the reordering of
//!   tensors and the index-permutation symmetry of each tensor,
//! - merging and cancellation of structurally equal terms,
//! - substitution of named definitions, and
//! - generation of `numpy.einsum` statements for the simplified equations.
//!
//! Expressions are read from a compact text format. A term literal consists of an optional
//! numeric factor, an optional summation over dummy indices and a product of tensor literals:
//!
//! ```text
//! 0.25 SUM <pqrs> v[pqrs] C[p] C[q] D[s] D[r]
//! ```
//!
//! Here `C` and `D` are creation and annihilation operators, `E<k>` and `R<k>` are spin-free
//! excitation operators and density matrices, and `delta` is the Kronecker delta. Any other
//! name denotes a generic tensor whose index-permutation symmetry can be configured by name
//! and arity.
//!
//! ## Examples and usage
//!
//! For most items (structs, enums, functions, and traits), their usages are illustrated in test
//! functions. Full calculations are described by YAML input files which are read into
//! [`interfaces::input::Input`] and run via [`interfaces::InputHandle`].
//!
//! ## Parallelism
//!
//! Normal ordering and canonicalisation fan out over the terms of an expression on a
//! [`rayon`] thread pool. Results are collected in the original term order, so they do not
//! depend on the number of threads.

pub mod context;
pub mod drivers;
pub mod expression;
pub mod index;
pub mod interfaces;
pub mod io;
pub mod permutation;
pub mod tensor;
pub mod term;
