//! Lowering of expressions into `numpy.einsum` statements.

use std::collections::{BTreeMap, BTreeSet};

use crate::index::Index;
use crate::tensor::{Tensor, TensorKind};

use super::Expr;

#[cfg(test)]
#[path = "einsum_tests.rs"]
mod einsum_tests;

/// Returns `name`, or the first name not in `taken` obtained by advancing its first character.
fn fresh_name(name: &str, taken: &BTreeSet<String>) -> String {
    let mut chars = name.chars().collect::<Vec<_>>();
    if chars.is_empty() {
        return name.to_string();
    }
    while taken.contains(&chars.iter().collect::<String>()) {
        chars[0] = char::from_u32(u32::from(chars[0]) + 1).unwrap_or(char::REPLACEMENT_CHARACTER);
    }
    chars.into_iter().collect()
}

impl Expr {
    /// Generates one `numpy.einsum` accumulation statement per term into the array `target`.
    ///
    /// Within a term, free indices are labelled first, then dummy indices, then target indices
    /// not occurring in the term. Distinct indices sharing a name (with different
    /// classifications) get distinct labels. The output labels follow the index order of
    /// `target`. Generic tensors and deltas are referred to by their name followed by the
    /// classification of each of their indices, as in `hIE`.
    pub fn to_einsum(&self, target: &Tensor) -> String {
        let mut out = String::new();
        for term in self.terms.iter() {
            let mut labels = BTreeMap::<Index, String>::new();
            let mut taken = BTreeSet::<String>::new();
            let mut assign = |idx: &Index| {
                if !labels.contains_key(idx) {
                    let label = fresh_name(idx.name(), &taken);
                    taken.insert(label.clone());
                    labels.insert(idx.clone(), label);
                }
            };
            let indices = || term.tensors().iter().flat_map(|t| t.indices().iter());
            indices()
                .filter(|idx| !term.ctr_indices().contains(*idx))
                .for_each(&mut assign);
            indices().for_each(&mut assign);
            target.indices().iter().for_each(&mut assign);

            let inputs = term
                .tensors()
                .iter()
                .map(|t| {
                    t.indices()
                        .iter()
                        .map(|idx| labels[idx].as_str())
                        .collect::<String>()
                })
                .collect::<Vec<_>>()
                .join(",");
            let output = target
                .indices()
                .iter()
                .map(|idx| labels[idx].as_str())
                .collect::<String>();
            let arrays = term
                .tensors()
                .iter()
                .map(|t| match t.kind() {
                    TensorKind::KroneckerDelta | TensorKind::Tensor => {
                        let blocks = t
                            .indices()
                            .iter()
                            .map(|idx| idx.types().to_string())
                            .collect::<String>();
                        format!(", {}{blocks}", t.name())
                    }
                    _ => format!(", {}", t.name()),
                })
                .collect::<String>();

            let scale = if term.factor() == 1.0 {
                String::new()
            } else {
                format!("{} * ", term.factor())
            };
            out.push_str(&format!(
                "{} += {scale}np.einsum('{inputs}->{output}'{arrays})\n",
                target.name()
            ));
        }
        out
    }
}
