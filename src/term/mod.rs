//! Products of tensors summed over dummy indices.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Mul;

use duplicate::duplicate_item;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::index::{Index, IndexTypeMap, IndexTypes, WickParseError};
use crate::tensor::{PermutationRuleMap, Tensor, TensorKind};

pub mod canonical;
pub mod normal_order;

#[cfg(test)]
mod term_tests;

/// Named tensor definitions: each name maps to the tensor as written on the left-hand side of
/// its definition and to the terms of the right-hand side.
pub type TermDefinitions = BTreeMap<String, (Tensor, Vec<Term>)>;

/// Upper bound on the character increments tried when looking for a fresh dummy name.
const MAX_RENAME_SHIFT: u32 = 100;

/// A single term of an expression: a scalar factor times a product of tensors, summed over a
/// set of dummy indices.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Term {
    tensors: Vec<Tensor>,

    /// The summed (dummy) indices. Every dummy index occurs in at least one tensor.
    ctr_indices: BTreeSet<Index>,
    factor: f64,
}

impl Term {
    pub fn new(tensors: Vec<Tensor>, ctr_indices: BTreeSet<Index>, factor: f64) -> Self {
        Self {
            tensors,
            ctr_indices,
            factor,
        }
    }

    /// A product of tensors with unit factor and no summation.
    pub fn from_tensors(tensors: Vec<Tensor>) -> Self {
        Self::new(tensors, BTreeSet::new(), 1.0)
    }

    pub fn tensors(&self) -> &[Tensor] {
        &self.tensors
    }

    pub fn ctr_indices(&self) -> &BTreeSet<Index> {
        &self.ctr_indices
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    pub fn with_factor(&self, factor: f64) -> Self {
        Self {
            factor,
            ..self.clone()
        }
    }

    /// Parses a term literal.
    ///
    /// A term literal consists of an optional (possibly parenthesised) numeric factor, an
    /// optional summation `SUM <pq>` or `\sum_{pq}`, and a sequence of tensor literals. The
    /// summation may carry explicit type tags after a bar, as in `SUM <pq|IE>` or
    /// `SUM <p1 q1|IA E>`; an explicit tag replaces the classification that `type_map` would give
    /// to that dummy index throughout the term.
    ///
    /// # Arguments
    ///
    /// * `text` - The term literal.
    /// * `type_map` - The classification of index names.
    /// * `rules` - The symmetry generators of generic tensors.
    ///
    /// # Returns
    ///
    /// The parsed term, or an error describing the malformed part of the literal.
    pub fn parse(
        text: &str,
        type_map: &IndexTypeMap,
        rules: &PermutationRuleMap,
    ) -> Result<Self, WickParseError> {
        let chars = text.chars().collect::<Vec<_>>();
        let mut pos = 0;

        let mut factor_text = String::new();
        while pos < chars.len() {
            let c = chars[pos];
            if c == ' ' || c == '(' {
            } else if c.is_ascii_digit() || c == '.' || c == '-' || c == '+' {
                factor_text.push(c);
            } else {
                break;
            }
            pos += 1;
        }
        while pos < chars.len() && (chars[pos] == ')' || chars[pos] == ' ') {
            pos += 1;
        }
        let factor = match factor_text.as_str() {
            "" | "+" => 1.0,
            "-" => -1.0,
            _ => factor_text.parse::<f64>().map_err(|err| {
                WickParseError(format!("invalid factor `{factor_text}` in `{text}`: {err}"))
            })?,
        };

        let rest = chars[pos..].iter().collect::<String>();
        let (sum_text, tag_text, rest) = if let Some(body) = rest
            .strip_prefix("\\sum_{")
            .map(|body| (body, '}'))
            .or_else(|| rest.strip_prefix("SUM <").map(|body| (body, '>')))
        {
            let (body, close) = body;
            let end = body.find(close).ok_or_else(|| {
                WickParseError(format!("unterminated summation in `{text}`"))
            })?;
            let (sum_text, tag_text) = match body[..end].split_once('|') {
                Some((sum_text, tag_text)) => (sum_text, Some(tag_text)),
                None => (&body[..end], None),
            };
            (sum_text.trim().to_string(), tag_text, &body[end + 1..])
        } else {
            (String::new(), None, rest.as_str())
        };

        let mut ctr_indices = Index::parse_set_with_types(&sum_text, type_map);
        let mut tensors = split_tensor_literals(rest, text)?
            .into_iter()
            .map(|literal| Tensor::parse(&literal, type_map, rules))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(tag_text) = tag_text {
            let names = Index::parse(&sum_text);
            let tags = if tag_text.trim().chars().any(char::is_whitespace) {
                tag_text
                    .split_whitespace()
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            } else {
                tag_text.trim().chars().map(String::from).collect::<Vec<_>>()
            };
            if tags.len() != names.len() {
                return Err(WickParseError(format!(
                    "{} type tag(s) given for {} dummy index(es) in `{text}`",
                    tags.len(),
                    names.len()
                )));
            }
            let retyped = names
                .iter()
                .zip(tags.iter())
                .map(|(name, tag)| Ok((name.name().to_string(), IndexTypes::from_tag(tag)?)))
                .collect::<Result<BTreeMap<_, _>, WickParseError>>()?;
            let retype = |idx: &Index| {
                retyped
                    .get(idx.name())
                    .map_or_else(|| idx.clone(), |&types| idx.with_types(types))
            };
            ctr_indices = ctr_indices.iter().map(retype).collect();
            tensors = tensors
                .iter()
                .map(|t| t.with_indices(t.indices().iter().map(retype).collect()))
                .collect();
        }

        Ok(Self::new(tensors, ctr_indices, factor))
    }

    /// Returns every index occurring in some tensor of the term.
    pub fn used_indices(&self) -> BTreeSet<Index> {
        self.tensors
            .iter()
            .flat_map(|t| t.indices().iter().cloned())
            .collect()
    }

    /// Replaces every tensor that has a definition by the terms of that definition.
    ///
    /// The formal indices of a definition are mapped onto the actual indices of the tensor being
    /// replaced. The dummy indices of the definition receive fresh names, obtained by advancing
    /// their first character until they no longer clash with any index already in use.
    ///
    /// # Panics
    ///
    /// Panics if a tensor has a different arity from its definition, or if an index of a
    /// definition term is neither a formal index nor a dummy index of that definition.
    pub fn substitute(&self, defs: &TermDefinitions) -> Vec<Term> {
        let mut partial = vec![Self::new(vec![], self.ctr_indices.clone(), self.factor)];
        for tensor in self.tensors.iter() {
            let Some((formal, def_terms)) = defs.get(tensor.name()) else {
                partial.iter_mut().for_each(|t| t.tensors.push(tensor.clone()));
                continue;
            };
            assert_eq!(
                formal.arity(),
                tensor.arity(),
                "`{tensor}` does not match the arity of its definition `{formal}`."
            );
            let mut expanded = Vec::with_capacity(partial.len() * def_terms.len());
            for head in partial.iter() {
                for def_term in def_terms.iter() {
                    let mut new_term = head.clone();
                    let mut used = self.used_indices();
                    used.extend(head.used_indices());
                    used.extend(head.ctr_indices.iter().cloned());
                    let mut idx_map = formal
                        .indices()
                        .iter()
                        .cloned()
                        .zip(tensor.indices().iter().cloned())
                        .collect::<BTreeMap<_, _>>();
                    for dummy in def_term.ctr_indices.iter() {
                        let fresh = (0..MAX_RENAME_SHIFT)
                            .filter_map(|i| dummy.shifted(i))
                            .find(|g| !used.contains(g))
                            .unwrap_or_else(|| dummy.clone());
                        new_term.ctr_indices.insert(fresh.clone());
                        used.insert(fresh.clone());
                        idx_map.insert(dummy.clone(), fresh);
                    }
                    for def_tensor in def_term.tensors.iter() {
                        let indices = def_tensor
                            .indices()
                            .iter()
                            .map(|idx| {
                                idx_map.get(idx).cloned().unwrap_or_else(|| {
                                    panic!(
                                        "Index `{idx}` of definition `{formal}` is neither a \
                                         formal nor a summed index."
                                    )
                                })
                            })
                            .collect();
                        new_term.tensors.push(def_tensor.with_indices(indices));
                    }
                    new_term.factor *= def_term.factor;
                    expanded.push(new_term);
                }
            }
            partial = expanded;
        }
        partial
    }

    /// Returns this term with unit factor.
    pub fn abs(&self) -> Self {
        self.with_factor(1.0)
    }

    /// Returns `true` if both terms have the same tensors and dummy indices, irrespective of
    /// their factors.
    pub fn abs_equal_to(&self, other: &Self) -> bool {
        self.tensors.len() == other.tensors.len()
            && self.ctr_indices.len() == other.ctr_indices.len()
            && self.tensors == other.tensors
            && self.ctr_indices == other.ctr_indices
    }

    /// Compares the shapes of two terms: numbers of tensors and dummy indices, then the total
    /// arity and count of each tensor kind.
    pub fn group_less(&self, other: &Self) -> bool {
        const KINDS: [TensorKind; 5] = [
            TensorKind::KroneckerDelta,
            TensorKind::Tensor,
            TensorKind::CreationOperator,
            TensorKind::DestroyOperator,
            TensorKind::SpinFreeOperator,
        ];
        if self.tensors.len() != other.tensors.len() {
            return self.tensors.len() < other.tensors.len();
        }
        if self.ctr_indices.len() != other.ctr_indices.len() {
            return self.ctr_indices.len() < other.ctr_indices.len();
        }
        let shape = |term: &Self, kind: TensorKind| {
            term.tensors
                .iter()
                .filter(|t| t.kind() == kind)
                .fold((0, 0), |(arity, count), t| (arity + t.arity(), count + 1))
        };
        for kind in KINDS {
            let (xa, xc) = shape(self, kind);
            let (ya, yc) = shape(other, kind);
            if xa != ya {
                return xa < ya;
            }
            if xc != yc {
                return xc < yc;
            }
        }
        false
    }

    /// Returns `true` if some operator of the term acts on an external index.
    pub fn has_external_ops(&self) -> bool {
        self.tensors
            .iter()
            .filter(|t| t.kind().is_operator())
            .flat_map(|t| t.indices().iter())
            .any(|idx| idx.types().intersects(IndexTypes::EXTERNAL))
    }

    /// Eliminates Kronecker deltas.
    ///
    /// A delta between incompatible classifications zeroes the factor. A delta between two free
    /// indices is kept, unless an equivalent delta has been kept already. A delta involving a
    /// dummy index is resolved by replacing that dummy everywhere by the other index, whose
    /// classification is narrowed to the intersection of both. A delta between equal indices is
    /// dropped.
    pub fn simplify_delta(&self) -> Self {
        let mut tensors = self.tensors.clone();
        let mut ctr_indices = self.ctr_indices.clone();
        let mut factor = self.factor;
        let mut kept = Vec::<usize>::with_capacity(tensors.len());
        for i in 0..tensors.len() {
            if tensors[i].kind() != TensorKind::KroneckerDelta {
                kept.push(i);
                continue;
            }
            let ia = tensors[i].indices()[0].clone();
            let ib = tensors[i].indices()[1].clone();
            if ia == ib {
                continue;
            }
            if !ia.types().is_compatible_with(ib.types()) {
                factor = 0.0;
            } else if !ctr_indices.contains(&ia) && !ctr_indices.contains(&ib) {
                let duplicate = kept.iter().any(|&j| {
                    tensors[j].kind() == TensorKind::KroneckerDelta && {
                        let (ja, jb) = (&tensors[j].indices()[0], &tensors[j].indices()[1]);
                        (*ja == ia && *jb == ib) || (*ja == ib && *jb == ia)
                    }
                });
                if !duplicate {
                    kept.push(i);
                }
            } else {
                let types = ia.types().meet(ib.types());
                let (kept_idx, removed_idx) = if ctr_indices.contains(&ia) {
                    (&ib, &ia)
                } else {
                    (&ia, &ib)
                };
                let narrowed = kept_idx.with_types(types);
                ctr_indices.remove(removed_idx);
                if ctr_indices.remove(kept_idx) {
                    ctr_indices.insert(narrowed.clone());
                }
                for (j, tensor) in tensors.iter_mut().enumerate() {
                    if j != i && tensor.indices().iter().any(|idx| *idx == ia || *idx == ib) {
                        let indices = tensor
                            .indices()
                            .iter()
                            .map(|idx| {
                                if *idx == ia || *idx == ib {
                                    narrowed.clone()
                                } else {
                                    idx.clone()
                                }
                            })
                            .collect();
                        *tensor = tensor.with_indices(indices);
                    }
                }
            }
        }
        let tensors = kept.into_iter().map(|i| tensors[i].clone()).collect();
        Self::new(tensors, ctr_indices, factor)
    }

    /// Splits every dummy index ranging over several orbital spaces into one term per space.
    ///
    /// The spaces are enumerated inactive, active, external for every dummy index in order, the
    /// splits of later indices varying slowest.
    pub fn split_index_types(&self) -> Vec<Term> {
        let dummies = self.ctr_indices.iter().cloned().collect::<Vec<_>>();
        let mut combinations = vec![dummies.clone()];
        for (i, dummy) in dummies.iter().enumerate() {
            let n_prev = combinations.len();
            let mut k = 0;
            for space in IndexTypes::SPACES {
                if dummy.types().intersects(space) && dummy.types().space() != space {
                    if k != 0 {
                        combinations.extend_from_within(..n_prev);
                    }
                    let types = (dummy.types() & !IndexTypes::SPACE) | space;
                    for combination in combinations[k * n_prev..(k + 1) * n_prev].iter_mut() {
                        combination[i] = combination[i].with_types(types);
                    }
                    k += 1;
                }
            }
        }
        combinations
            .into_iter()
            .map(|combination| {
                let tensors = self
                    .tensors
                    .iter()
                    .map(|t| {
                        let indices = t
                            .indices()
                            .iter()
                            .map(|idx| {
                                combination
                                    .iter()
                                    .find(|d| {
                                        d.name() == idx.name() && d.types().intersects(idx.types())
                                    })
                                    .cloned()
                                    .unwrap_or_else(|| idx.clone())
                            })
                            .collect();
                        t.with_indices(indices)
                    })
                    .collect();
                Self::new(tensors, combination.into_iter().collect(), self.factor)
            })
            .collect()
    }

    /// A total order on terms: number of tensors, number of dummy indices, tensors, dummy
    /// indices and finally the factor.
    pub fn canonical_cmp(&self, other: &Self) -> Ordering {
        self.tensors
            .len()
            .cmp(&other.tensors.len())
            .then_with(|| self.ctr_indices.len().cmp(&other.ctr_indices.len()))
            .then_with(|| self.tensors.cmp(&other.tensors))
            .then_with(|| self.ctr_indices.cmp(&other.ctr_indices))
            .then_with(|| self.factor.total_cmp(&other.factor))
    }

    /// Returns the Hermitian conjugate of the operator string, leaving other tensors in place.
    ///
    /// The operators are reversed in order and each is conjugated.
    pub fn conjugate(&self) -> Self {
        let mut conjugated = self
            .tensors
            .iter()
            .filter(|t| t.kind().is_operator())
            .map(Tensor::conjugated)
            .collect::<Vec<_>>();
        let tensors = self
            .tensors
            .iter()
            .map(|t| {
                if t.kind().is_operator() {
                    conjugated.pop().unwrap_or_else(|| t.clone())
                } else {
                    t.clone()
                }
            })
            .collect();
        Self::new(tensors, self.ctr_indices.clone(), self.factor)
    }
}

/// Splits the tensor part of a term literal into tensor literals, each ending with a closing
/// bracket. Whitespace is only significant inside brackets.
fn split_tensor_literals(text: &str, term: &str) -> Result<Vec<String>, WickParseError> {
    let mut literals = vec![];
    let mut current = String::new();
    let mut inside = false;
    for c in text.chars() {
        match c {
            '[' | '{' => {
                inside = true;
                current.push(c);
            }
            ']' | '}' => {
                current.push(c);
                literals.push(std::mem::take(&mut current));
                inside = false;
            }
            c if c.is_whitespace() && !inside => {}
            c => current.push(c),
        }
    }
    if inside || !current.is_empty() {
        return Err(WickParseError(format!(
            "incomplete tensor literal `{current}` in `{term}`"
        )));
    }
    Ok(literals)
}

impl Term {
    /// Multiplies two terms.
    ///
    /// A dummy index of either operand that also occurs in the other operand is renamed by
    /// advancing its first character to a name unused by both operands. A dummy index summed in
    /// both operands is kept on the left and renamed on the right.
    fn product(&self, rhs: &Term) -> Term {
        let a_used = self.used_indices();
        let b_used = rhs.used_indices();
        let mut used = a_used.union(&b_used).cloned().collect::<BTreeSet<_>>();
        let a_rep = self
            .ctr_indices
            .intersection(&b_used)
            .cloned()
            .collect::<BTreeSet<_>>();
        let b_rep = rhs
            .ctr_indices
            .intersection(&a_used)
            .cloned()
            .collect::<BTreeSet<_>>();
        let c_rep = self
            .ctr_indices
            .intersection(&rhs.ctr_indices)
            .cloned()
            .collect::<BTreeSet<_>>();

        let mut renames = BTreeMap::new();
        for idx in used.clone().iter() {
            if a_rep.contains(idx) || b_rep.contains(idx) {
                if let Some(fresh) = (1..MAX_RENAME_SHIFT)
                    .filter_map(|i| idx.shifted(i))
                    .find(|g| !used.contains(g))
                {
                    used.insert(fresh.clone());
                    renames.insert(idx.clone(), fresh);
                }
            }
        }

        let rename_a = |idx: &Index| match renames.get(idx) {
            Some(fresh) if a_rep.contains(idx) && !c_rep.contains(idx) => fresh.clone(),
            _ => idx.clone(),
        };
        let rename_b = |idx: &Index| match renames.get(idx) {
            Some(fresh) if b_rep.contains(idx) => fresh.clone(),
            _ => idx.clone(),
        };
        let retensor = |t: &Tensor, rename: &dyn Fn(&Index) -> Index| {
            if t.indices().iter().any(|idx| rename(idx) != *idx) {
                t.with_indices(t.indices().iter().map(rename).collect())
            } else {
                t.clone()
            }
        };

        let tensors = self
            .tensors
            .iter()
            .map(|t| retensor(t, &rename_a))
            .chain(rhs.tensors.iter().map(|t| retensor(t, &rename_b)))
            .collect();
        let ctr_indices = self
            .ctr_indices
            .iter()
            .map(rename_a)
            .chain(rhs.ctr_indices.iter().map(rename_b))
            .collect();
        Term::new(tensors, ctr_indices, self.factor * rhs.factor)
    }
}

// ---
// Mul
// ---
#[duplicate_item(
    lhs_ rhs_;
    [ Term ] [ Term ];
    [ Term ] [ &Term ];
    [ &Term ] [ Term ];
    [ &Term ] [ &Term ];
)]
impl Mul<rhs_> for lhs_ {
    type Output = Term;

    fn mul(self, rhs: rhs_) -> Self::Output {
        let (a, b): (&Term, &Term) = (&self, &rhs);
        a.product(b)
    }
}

#[duplicate_item(
    lhs_;
    [ Term ];
    [ &Term ];
)]
impl Mul<f64> for lhs_ {
    type Output = Term;

    fn mul(self, rhs: f64) -> Self::Output {
        self.with_factor(self.factor * rhs)
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:16.10}) ", self.factor)?;
        if !self.ctr_indices.is_empty() {
            let d = if self.ctr_indices.iter().all(Index::is_short) {
                ""
            } else {
                " "
            };
            write!(f, "SUM <{d}")?;
            for idx in self.ctr_indices.iter() {
                write!(f, "{idx}{d}")?;
            }
            if self.ctr_indices.iter().any(Index::has_types) {
                let tags = self
                    .ctr_indices
                    .iter()
                    .map(|idx| idx.types().to_string())
                    .collect::<Vec<_>>();
                let sep = if tags.iter().all(|tag| tag.chars().count() == 1) {
                    ""
                } else {
                    " "
                };
                write!(f, "|{}", tags.join(sep))?;
            }
            write!(f, "> ")?;
        }
        write!(f, "{}", self.tensors.iter().join(" "))
    }
}
