//! Canonical forms of terms up to tensor symmetry and dummy-index relabelling.

use std::collections::{BTreeMap, BTreeSet};

use itertools::Itertools;

use crate::index::Index;
use crate::tensor::{DummyLabelling, Tensor};

use super::Term;

#[cfg(test)]
#[path = "canonical_tests.rs"]
mod canonical_tests;

impl Term {
    /// Separates Kronecker deltas and generic tensors from operators, bringing the slots of
    /// every tensor into canonical order on the way.
    fn partition_sorted(&self, factor: &mut f64) -> (Vec<Tensor>, Vec<Tensor>) {
        let mut ordinary = vec![];
        let mut operators = vec![];
        for tensor in self.tensors.iter() {
            let sorted = tensor.sort(factor);
            if tensor.kind().is_operator() {
                operators.push(sorted);
            } else {
                ordinary.push(sorted);
            }
        }
        (ordinary, operators)
    }

    /// Brings every tensor into canonical slot order and sorts the non-operator tensors, leaving
    /// dummy indices untouched.
    pub fn simple_sort(&self) -> Self {
        let mut factor = self.factor;
        let (mut ordinary, operators) = self.partition_sorted(&mut factor);
        ordinary.sort();
        ordinary.extend(operators);
        Self::new(ordinary, self.ctr_indices.clone(), factor)
    }

    /// Computes the canonical form of this term.
    ///
    /// Non-operator tensors are grouped by name and arity. Within every group the tensors are
    /// committed one at a time: each remaining tensor is canonicalised against the dummy
    /// labellings built so far and the smallest candidate is taken, after which the labellings
    /// are refined to those reproducing the committed tensor. Operators follow in their given
    /// order. Dummy indices end up renamed to consecutive labels `0`, `1`, ... and the sign of the
    /// permutations involved is absorbed into the factor.
    ///
    /// Two terms are equal up to renaming of dummy indices and tensor symmetry exactly when their
    /// canonical forms have equal tensors and dummy indices.
    ///
    /// # Panics
    ///
    /// Panics if some dummy index occurs in no tensor of the term.
    pub fn quick_sort(&self) -> Self {
        let mut factor = self.factor;
        let (mut ordinary, operators) = self.partition_sorted(&mut factor);
        ordinary.sort_by(|a, b| {
            a.name()
                .cmp(b.name())
                .then_with(|| a.arity().cmp(&b.arity()))
        });

        let ctr = &self.ctr_indices;
        let mut labellings = vec![DummyLabelling::identity()];
        let mut next_label = 0;
        let mut committed = Vec::with_capacity(self.tensors.len());
        let groups = ordinary
            .iter()
            .group_by(|t| (t.name().to_string(), t.arity()));
        for (_, group) in &groups {
            let mut pending = group.collect::<Vec<_>>();
            for j in 0..pending.len() {
                let mut best: Option<(usize, Tensor, usize)> = None;
                for (k, tensor) in pending.iter().enumerate().skip(j) {
                    let mut label = next_label;
                    let candidate = tensor.sort_with_dummies(ctr, &labellings, &mut label);
                    let better = best
                        .as_ref()
                        .map_or(true, |(_, chosen, _)| candidate.indices() < chosen.indices());
                    if better {
                        best = Some((k, candidate, label));
                    }
                }
                let (k, chosen, label) =
                    best.unwrap_or_else(|| panic!("No tensor left to commit in `{self}`."));
                labellings = pending[k].sort_gen_maps(&chosen, ctr, &labellings, next_label);
                next_label = label;
                pending.swap(j, k);
                committed.push(chosen);
            }
        }
        for tensor in operators.iter() {
            let start = next_label;
            let chosen = tensor.sort_with_dummies(ctr, &labellings, &mut next_label);
            labellings = tensor.sort_gen_maps(&chosen, ctr, &labellings, start);
            committed.push(chosen);
        }

        let labelling = &labellings[0];
        assert!(
            next_label == labelling.labels.len() && next_label == ctr.len(),
            "Every summed index must occur in some tensor of `{self}`."
        );
        let ctr_indices = ctr
            .iter()
            .map(|idx| Index::dummy_label(labelling.labels[idx], idx.types()))
            .collect();
        Self::new(committed, ctr_indices, factor * f64::from(labelling.sign))
    }

    /// Computes a canonical form by brute force over every relabelling of the dummy indices.
    ///
    /// The result is the smallest term, under [`Self::canonical_cmp`], among all relabellings
    /// with every tensor in canonical slot order and the non-operator tensors sorted. The cost is
    /// factorial in the number of dummy indices; [`Self::quick_sort`] is the method to use for
    /// anything but cross-checking.
    pub fn old_sort(&self) -> Self {
        let mut factor = self.factor;
        let (ordinary, operators) = self.partition_sorted(&mut factor);
        let n_ordinary = ordinary.len();
        let tensors = ordinary.into_iter().chain(operators).collect::<Vec<_>>();

        let mut first_seen = BTreeMap::<Index, usize>::new();
        for idx in tensors.iter().flat_map(|t| t.indices().iter()) {
            if self.ctr_indices.contains(idx) && !first_seen.contains_key(idx) {
                first_seen.insert(idx.clone(), first_seen.len());
            }
        }
        let n_dummies = first_seen.len();

        let relabelled = |labels: &[usize]| {
            let rename = |idx: &Index| match first_seen.get(idx) {
                Some(&pos) => Index::dummy_label(labels[pos], idx.types()),
                None => idx.clone(),
            };
            let mut xfactor = factor;
            let mut xtensors = tensors
                .iter()
                .map(|t| {
                    t.with_indices(t.indices().iter().map(rename).collect())
                        .sort(&mut xfactor)
                })
                .collect::<Vec<_>>();
            xtensors[..n_ordinary].sort();
            let xctr = self.ctr_indices.iter().map(rename).collect::<BTreeSet<_>>();
            (Self::new(xtensors, BTreeSet::new(), xfactor), xctr)
        };

        let (best, best_ctr) = (0..n_dummies)
            .permutations(n_dummies)
            .map(|labels| relabelled(&labels[..]))
            .min_by(|(x, _), (y, _)| x.canonical_cmp(y))
            .unwrap_or_else(|| relabelled(&[][..]));
        Self::new(best.tensors, best_ctr, best.factor)
    }
}
