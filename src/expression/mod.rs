//! Sums of terms and the expansion and simplification pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{Add, BitAnd, BitXor, Mul, Neg, Sub};

use approx::abs_diff_eq;
use duplicate::duplicate_item;
use indexmap::IndexMap;
use log;
use rayon::prelude::*;
use rayon::ThreadPool;
use serde::{Deserialize, Serialize};

use crate::index::{Index, IndexTypeMap, WickParseError};
use crate::permutation::{pair_symmetric, Permutation};
use crate::tensor::{PermutationRuleMap, Tensor, TensorKind};
use crate::term::{Term, TermDefinitions};

pub mod einsum;

#[cfg(test)]
mod expression_tests;

/// Factors whose magnitude does not exceed this threshold are treated as zero.
pub const ZERO_THRESHOLD: f64 = 1e-12;

/// Named definitions of tensors by expressions, as produced by [`Expr::parse_def`].
pub type Definitions = BTreeMap<String, (Tensor, Expr)>;

/// A sum of terms.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    terms: Vec<Term>,
}

impl Expr {
    pub fn new(terms: Vec<Term>) -> Self {
        Self { terms }
    }

    pub fn terms(&self) -> &[Term] {
        &self.terms
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Parses an expression literal: one term literal per line. Blank lines are skipped.
    ///
    /// # Arguments
    ///
    /// * `text` - The expression literal.
    /// * `type_map` - The classification of index names.
    /// * `rules` - The symmetry generators of generic tensors.
    ///
    /// # Returns
    ///
    /// The parsed expression, or the error of the first malformed term.
    pub fn parse(
        text: &str,
        type_map: &IndexTypeMap,
        rules: &PermutationRuleMap,
    ) -> Result<Self, WickParseError> {
        text.split(|c| c == '\n' || c == '\r')
            .filter(|line| !line.trim().is_empty())
            .map(|line| Term::parse(line, type_map, rules))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Parses a definition literal `Name[idx...] = <expression literal>`.
    ///
    /// # Returns
    ///
    /// The defined tensor as written on the left-hand side together with its defining
    /// expression, or an error if there is no `=` or either side is malformed.
    pub fn parse_def(
        text: &str,
        type_map: &IndexTypeMap,
        rules: &PermutationRuleMap,
    ) -> Result<(Tensor, Self), WickParseError> {
        let (lhs, rhs) = text
            .split_once('=')
            .ok_or_else(|| WickParseError(format!("definition `{text}` has no `=`")))?;
        let tensor = Tensor::parse(lhs, type_map, rules)?;
        let expr = Self::parse(rhs, type_map, rules)?;
        Ok((tensor, expr))
    }

    /// Replaces every occurrence of a defined tensor by its defining expression.
    pub fn substitute(&self, defs: &Definitions) -> Self {
        let term_defs = defs
            .iter()
            .map(|(name, (tensor, expr))| (name.clone(), (tensor.clone(), expr.terms.clone())))
            .collect::<TermDefinitions>();
        Self::new(
            self.terms
                .iter()
                .flat_map(|term| term.substitute(&term_defs))
                .collect(),
        )
    }

    /// Splits every term over the concrete index spaces of its dummy indices.
    pub fn split_index_types(&self) -> Self {
        Self::new(
            self.terms
                .iter()
                .flat_map(Term::split_index_types)
                .collect(),
        )
    }

    /// Normal-orders every term after splitting its dummy indices over concrete index spaces.
    ///
    /// Terms are normal-ordered in parallel on the current thread pool. The branches are
    /// collected in term order, so the result does not depend on the number of threads.
    ///
    /// # Arguments
    ///
    /// * `max_unctr` - If given, the largest number of uncontracted operators kept in a term.
    /// * `no_ctr` - If `true`, operators are reordered without contraction.
    pub fn expand(&self, max_unctr: Option<usize>, no_ctr: bool) -> Self {
        let split = self.split_index_types();
        log::debug!(
            "Normal-ordering {} term(s) ({} before splitting index spaces)...",
            split.len(),
            self.len()
        );
        let branches = split
            .terms
            .par_iter()
            .map(|term| term.normal_order(max_unctr, no_ctr))
            .collect::<Vec<_>>();
        let expanded = Self::new(branches.into_iter().flatten().collect());
        log::debug!("Normal-ordering produced {} term(s).", expanded.len());
        expanded
    }

    /// Same as [`Self::expand`], running inside `pool`.
    pub fn expand_in(&self, pool: &ThreadPool, max_unctr: Option<usize>, no_ctr: bool) -> Self {
        pool.install(|| self.expand(max_unctr, no_ctr))
    }

    pub fn simplify_delta(&self) -> Self {
        Self::new(self.terms.iter().map(Term::simplify_delta).collect())
    }

    /// Drops terms with a negligible factor or without tensors.
    pub fn simplify_zero(&self) -> Self {
        Self::new(
            self.terms
                .iter()
                .filter(|term| {
                    !abs_diff_eq!(term.factor(), 0.0, epsilon = ZERO_THRESHOLD)
                        && !term.tensors().is_empty()
                })
                .cloned()
                .collect(),
        )
    }

    /// Merges terms that are equal up to dummy-index renaming and tensor symmetry.
    ///
    /// Every term is canonicalised in parallel with [`Term::quick_sort`]. Terms sharing a
    /// canonical form are summed into the first of them, expressed with the factor relative to
    /// that first occurrence. Cancelled terms are dropped and the result is sorted with
    /// [`Term::canonical_cmp`].
    pub fn simplify_merge(&self) -> Self {
        let sorted = self
            .terms
            .par_iter()
            .map(|term| term.abs().quick_sort())
            .collect::<Vec<_>>();

        // Canonical tensors and dummies => (first occurrence, accumulated factor)
        let mut groups = IndexMap::<(Vec<Tensor>, BTreeSet<Index>), (usize, f64)>::new();
        for (i, canonical) in sorted.iter().enumerate() {
            let key = (canonical.tensors().to_vec(), canonical.ctr_indices().clone());
            groups
                .entry(key)
                .and_modify(|(first, factor)| {
                    *factor += self.terms[i].factor() * canonical.factor() * sorted[*first].factor()
                })
                .or_insert((i, self.terms[i].factor()));
        }
        log::debug!(
            "Merged {} term(s) into {} group(s).",
            self.len(),
            groups.len()
        );

        let mut merged = Self::new(
            groups
                .values()
                .map(|&(first, factor)| self.terms[first].with_factor(factor))
                .collect(),
        )
        .simplify_zero();
        merged.terms.sort_by(Term::canonical_cmp);
        merged
    }

    /// Eliminates deltas, drops zero terms and merges equal terms.
    pub fn simplify(&self) -> Self {
        let simplified = self.simplify_delta().simplify_zero().simplify_merge();
        log::debug!(
            "Simplified {} term(s) into {} term(s).",
            self.len(),
            simplified.len()
        );
        simplified
    }

    /// Same as [`Self::simplify`], running inside `pool`.
    pub fn simplify_in(&self, pool: &ThreadPool) -> Self {
        pool.install(|| self.simplify())
    }

    /// Drops every term with an operator acting on an external index.
    pub fn remove_external(&self) -> Self {
        Self::new(
            self.terms
                .iter()
                .filter(|term| !term.has_external_ops())
                .cloned()
                .collect(),
        )
    }

    /// Extends the symmetry of the spin-free operator in every term containing exactly one, so
    /// that its creation and annihilation halves may also be exchanged as in a density matrix.
    pub fn add_spin_free_trans_symm(&self) -> Self {
        Self::new(
            self.terms
                .iter()
                .map(|term| {
                    let spin_free = term
                        .tensors()
                        .iter()
                        .filter(|t| t.kind() == TensorKind::SpinFreeOperator)
                        .count();
                    if spin_free != 1 {
                        return term.clone();
                    }
                    let tensors = term
                        .tensors()
                        .iter()
                        .map(|t| {
                            if t.kind() == TensorKind::SpinFreeOperator {
                                let n = t.arity();
                                t.with_symmetry_group(Permutation::complete_set(
                                    n,
                                    &pair_symmetric(n / 2, true),
                                ))
                            } else {
                                t.clone()
                            }
                        })
                        .collect();
                    Term::new(tensors, term.ctr_indices().clone(), term.factor())
                })
                .collect(),
        )
    }

    pub fn conjugate(&self) -> Self {
        Self::new(self.terms.iter().map(Term::conjugate).collect())
    }

    pub fn simple_sort(&self) -> Self {
        Self::new(self.terms.iter().map(Term::simple_sort).collect())
    }
}

impl From<Term> for Expr {
    fn from(term: Term) -> Self {
        Self::new(vec![term])
    }
}

impl From<Vec<Term>> for Expr {
    fn from(terms: Vec<Term>) -> Self {
        Self::new(terms)
    }
}

// ---
// Add
// ---
#[duplicate_item(
    lhs_ rhs_;
    [ Expr ] [ Expr ];
    [ Expr ] [ &Expr ];
    [ &Expr ] [ Expr ];
    [ &Expr ] [ &Expr ];
)]
impl Add<rhs_> for lhs_ {
    type Output = Expr;

    fn add(self, rhs: rhs_) -> Self::Output {
        let (a, b): (&Expr, &Expr) = (&self, &rhs);
        Expr::new(a.terms.iter().chain(b.terms.iter()).cloned().collect())
    }
}

#[duplicate_item(
    lhs_ rhs_;
    [ Term ] [ Term ];
    [ Term ] [ &Term ];
    [ &Term ] [ Term ];
    [ &Term ] [ &Term ];
)]
impl Add<rhs_> for lhs_ {
    type Output = Expr;

    fn add(self, rhs: rhs_) -> Self::Output {
        let (a, b): (&Term, &Term) = (&self, &rhs);
        Expr::new(vec![a.clone(), b.clone()])
    }
}

// ---
// Sub
// ---
#[duplicate_item(
    lhs_ rhs_;
    [ Expr ] [ Expr ];
    [ Expr ] [ &Expr ];
    [ &Expr ] [ Expr ];
    [ &Expr ] [ &Expr ];
)]
impl Sub<rhs_> for lhs_ {
    type Output = Expr;

    fn sub(self, rhs: rhs_) -> Self::Output {
        let (a, b): (&Expr, &Expr) = (&self, &rhs);
        Expr::new(
            a.terms
                .iter()
                .cloned()
                .chain(b.terms.iter().map(|term| term * -1.0))
                .collect(),
        )
    }
}

// ---
// Neg
// ---
#[duplicate_item(
    lhs_;
    [ Expr ];
    [ &Expr ];
)]
impl Neg for lhs_ {
    type Output = Expr;

    fn neg(self) -> Self::Output {
        self * -1.0
    }
}

// ---
// Mul
// ---
#[duplicate_item(
    lhs_ rhs_;
    [ Expr ] [ Expr ];
    [ Expr ] [ &Expr ];
    [ &Expr ] [ Expr ];
    [ &Expr ] [ &Expr ];
)]
impl Mul<rhs_> for lhs_ {
    type Output = Expr;

    /// Distributes the product over the terms of both factors.
    fn mul(self, rhs: rhs_) -> Self::Output {
        let (a, b): (&Expr, &Expr) = (&self, &rhs);
        Expr::new(
            a.terms
                .iter()
                .flat_map(|ta| b.terms.iter().map(move |tb| ta * tb))
                .collect(),
        )
    }
}

#[duplicate_item(
    lhs_;
    [ Expr ];
    [ &Expr ];
)]
impl Mul<f64> for lhs_ {
    type Output = Expr;

    fn mul(self, rhs: f64) -> Self::Output {
        Expr::new(self.terms.iter().map(|term| term * rhs).collect())
    }
}

#[duplicate_item(
    rhs_;
    [ Expr ];
    [ &Expr ];
)]
impl Mul<rhs_> for f64 {
    type Output = Expr;

    fn mul(self, rhs: rhs_) -> Self::Output {
        rhs * self
    }
}

// ------
// BitXor
// ------
#[duplicate_item(
    lhs_ rhs_;
    [ Expr ] [ Expr ];
    [ Expr ] [ &Expr ];
    [ &Expr ] [ Expr ];
    [ &Expr ] [ &Expr ];
)]
impl BitXor<rhs_> for lhs_ {
    type Output = Expr;

    /// The commutator `a * b - b * a`.
    fn bitxor(self, rhs: rhs_) -> Self::Output {
        let (a, b): (&Expr, &Expr) = (&self, &rhs);
        a * b - b * a
    }
}

// ------
// BitAnd
// ------
#[duplicate_item(
    lhs_ rhs_;
    [ Expr ] [ Expr ];
    [ Expr ] [ &Expr ];
    [ &Expr ] [ Expr ];
    [ &Expr ] [ &Expr ];
)]
impl BitAnd<rhs_> for lhs_ {
    type Output = Expr;

    /// The product with every index summed over.
    fn bitand(self, rhs: rhs_) -> Self::Output {
        let (a, b): (&Expr, &Expr) = (&self, &rhs);
        Expr::new(
            (a * b)
                .terms
                .into_iter()
                .map(|term| {
                    let mut ctr_indices = term.ctr_indices().clone();
                    ctr_indices.extend(term.used_indices());
                    Term::new(term.tensors().to_vec(), ctr_indices, term.factor())
                })
                .collect(),
        )
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EXPR /{}/", self.terms.len())?;
        if !self.terms.is_empty() {
            writeln!(f)?;
        }
        for term in self.terms.iter() {
            writeln!(f, "{term}")?;
        }
        Ok(())
    }
}
