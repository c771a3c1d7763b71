//! Symbolic tensors and second-quantised operators.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::hash::{Hash, Hasher};

use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::index::{Index, IndexTypeMap, IndexTypes, WickParseError};
use crate::permutation::{non_symmetric, pair_symmetric, two_symmetric, Permutation};


lazy_static! {
    static ref SPIN_FREE_RE: Regex =
        Regex::new(r"^([ER])([1-9])$").expect("Regex pattern invalid.");
}

/// A table of symmetry generators for generic tensors, keyed by tensor name and arity.
pub type PermutationRuleMap = BTreeMap<(String, usize), Vec<Permutation>>;

// ==================
// Struct definitions
// ==================

/// An enumerated type for the kinds of symbolic tensors.
///
/// The declaration order is significant: creation operators precede annihilation operators,
/// which is the order used to bring spin-free operator strings into normal order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TensorKind {
    /// Variant for a fermionic creation operator.
    CreationOperator,

    /// Variant for a fermionic annihilation operator.
    DestroyOperator,

    /// Variant for a spin-free (spin-summed) excitation operator or density matrix.
    SpinFreeOperator,

    /// Variant for a Kronecker delta.
    KroneckerDelta,

    /// Variant for a generic tensor such as an integral or an amplitude.
    Tensor,
}

impl TensorKind {
    /// Returns `true` for creation, annihilation and spin-free operators.
    pub fn is_operator(&self) -> bool {
        matches!(
            self,
            TensorKind::CreationOperator
                | TensorKind::DestroyOperator
                | TensorKind::SpinFreeOperator
        )
    }
}

impl fmt::Display for TensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TensorKind::CreationOperator => write!(f, "creation operator"),
            TensorKind::DestroyOperator => write!(f, "annihilation operator"),
            TensorKind::SpinFreeOperator => write!(f, "spin-free operator"),
            TensorKind::KroneckerDelta => write!(f, "Kronecker delta"),
            TensorKind::Tensor => write!(f, "tensor"),
        }
    }
}

/// A relabelling of dummy indices to consecutive integer labels, together with the sign
/// accumulated by the tensor permutations that realise it.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DummyLabelling {
    /// The integer label of every dummy index labelled so far.
    pub labels: BTreeMap<Index, usize>,

    /// The accumulated sign, either `1` or `-1`.
    pub sign: i8,
}

impl DummyLabelling {
    /// The labelling with no labelled index and a positive sign.
    pub fn identity() -> Self {
        Self {
            labels: BTreeMap::new(),
            sign: 1,
        }
    }
}

/// A symbolic tensor carrying the group of index permutations under which it is invariant (up
/// to sign).
///
/// Equality and hashing only consider the kind, the name and the indices; the symmetry group is
/// derived data.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Tensor {
    name: String,
    indices: Vec<Index>,

    /// The symmetry group. The identity always comes first, and every permutation that would
    /// place an index into a slot of a disjoint classification has been removed.
    perms: Vec<Permutation>,
    kind: TensorKind,
}

impl Tensor {
    /// Constructs a tensor whose symmetry group is closed from `generators` and then pruned
    /// against the classifications of `indices`.
    pub fn new(
        name: &str,
        indices: Vec<Index>,
        generators: &[Permutation],
        kind: TensorKind,
    ) -> Self {
        let group = Permutation::complete_set(indices.len(), generators);
        let perms = Self::reset_permutations(&indices, group);
        Self {
            name: name.to_string(),
            indices,
            perms,
            kind,
        }
    }

    /// Removes the permutations that move an index into a slot whose classification is
    /// incompatible with its own.
    fn reset_permutations(indices: &[Index], perms: Vec<Permutation>) -> Vec<Permutation> {
        perms
            .into_iter()
            .filter(|perm| {
                perm.image().iter().enumerate().all(|(i, &pi)| {
                    indices[pi]
                        .types()
                        .is_compatible_with(indices[i].types())
                })
            })
            .collect()
    }

    /// Creation operator on `index`.
    pub fn cre(index: Index) -> Self {
        Self::new("C", vec![index], &non_symmetric(), TensorKind::CreationOperator)
    }

    /// Annihilation operator on `index`.
    pub fn des(index: Index) -> Self {
        Self::new("D", vec![index], &non_symmetric(), TensorKind::DestroyOperator)
    }

    /// Symmetric Kronecker delta between two indices.
    pub fn kronecker_delta(a: Index, b: Index) -> Self {
        Self::new("delta", vec![a, b], &two_symmetric(), TensorKind::KroneckerDelta)
    }

    /// Spin-free excitation operator `E<k>` with creation indices in the first half and
    /// annihilation indices in the second half.
    ///
    /// # Panics
    ///
    /// Panics if the number of indices is odd.
    pub fn spin_free(indices: Vec<Index>) -> Self {
        assert!(
            indices.len() % 2 == 0,
            "A spin-free operator needs an even number of indices."
        );
        let k = indices.len() / 2;
        Self::new(
            &format!("E{k}"),
            indices,
            &pair_symmetric(k, false),
            TensorKind::SpinFreeOperator,
        )
    }

    /// Spin-free density matrix `R<k>`, which additionally is symmetric under the exchange of its
    /// two halves.
    ///
    /// # Panics
    ///
    /// Panics if the number of indices is odd.
    pub fn spin_free_density_matrix(indices: Vec<Index>) -> Self {
        assert!(
            indices.len() % 2 == 0,
            "A spin-free density matrix needs an even number of indices."
        );
        let k = indices.len() / 2;
        Self::new(
            &format!("R{k}"),
            indices,
            &pair_symmetric(k, true),
            TensorKind::SpinFreeOperator,
        )
    }

    /// Parses a tensor literal such as `v[pqrs]`, `E2[ij,ab]`, `t_{ia}` or `h[p1 q1]`.
    ///
    /// # Arguments
    ///
    /// * `text` - The tensor literal.
    /// * `type_map` - The classification of index names.
    /// * `rules` - The symmetry generators of generic tensors, keyed by name and arity.
    ///
    /// # Returns
    ///
    /// The parsed tensor, or an error if the literal is malformed or if a builtin tensor name is
    /// used with the wrong number of indices.
    pub fn parse(
        text: &str,
        type_map: &IndexTypeMap,
        rules: &PermutationRuleMap,
    ) -> Result<Self, WickParseError> {
        let text = text.trim();
        let open = text
            .find(|c: char| c == '[' || c == '_')
            .ok_or_else(|| WickParseError(format!("tensor literal `{text}` has no index list")))?;
        let name = text[..open]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>();
        if name.is_empty() {
            return Err(WickParseError(format!(
                "tensor literal `{text}` has no name"
            )));
        }
        let body = text[open..].trim_start_matches('_');
        let closed = (body.starts_with('[') && body.ends_with(']'))
            || (body.starts_with('{') && body.ends_with('}'));
        if !closed {
            return Err(WickParseError(format!(
                "tensor literal `{text}` has an unterminated index list"
            )));
        }
        let indices = Index::parse_with_types(body[1..body.len() - 1].trim(), type_map);
        let arity = indices.len();

        if let Some(caps) = SPIN_FREE_RE.captures(&name) {
            let k = caps[2]
                .parse::<usize>()
                .map_err(|err| WickParseError(err.to_string()))?;
            if arity != 2 * k {
                return Err(WickParseError(format!(
                    "spin-free tensor `{name}` expects {} indices but {arity} were given",
                    2 * k
                )));
            }
            let hermitian = &caps[1] == "R";
            return Ok(Self::new(
                &name,
                indices,
                &pair_symmetric(k, hermitian),
                TensorKind::SpinFreeOperator,
            ));
        }

        match (name.as_str(), arity) {
            ("C", 1) => Ok(Self::new(
                &name,
                indices,
                &non_symmetric(),
                TensorKind::CreationOperator,
            )),
            ("D", 1) => Ok(Self::new(
                &name,
                indices,
                &non_symmetric(),
                TensorKind::DestroyOperator,
            )),
            ("delta", 2) => Ok(Self::new(
                &name,
                indices,
                &two_symmetric(),
                TensorKind::KroneckerDelta,
            )),
            ("delta", _) => Err(WickParseError(format!(
                "Kronecker delta expects 2 indices but {arity} were given"
            ))),
            _ => {
                let generators = rules
                    .get(&(name.clone(), arity))
                    .cloned()
                    .unwrap_or_else(non_symmetric);
                Ok(Self::new(&name, indices, &generators, TensorKind::Tensor))
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn indices(&self) -> &[Index] {
        &self.indices
    }

    pub fn perms(&self) -> &[Permutation] {
        &self.perms
    }

    pub fn kind(&self) -> TensorKind {
        self.kind
    }

    pub fn arity(&self) -> usize {
        self.indices.len()
    }

    /// Returns a copy of this tensor with its indices renamed or retyped slot by slot. The
    /// symmetry group is kept as it is.
    pub fn with_indices(&self, indices: Vec<Index>) -> Self {
        assert_eq!(
            indices.len(),
            self.indices.len(),
            "Renaming must keep the arity of `{self}`."
        );
        Self {
            indices,
            ..self.clone()
        }
    }

    /// Returns a copy of this tensor with its symmetry group replaced verbatim.
    pub fn with_symmetry_group(&self, perms: Vec<Permutation>) -> Self {
        Self {
            perms,
            ..self.clone()
        }
    }

    /// Returns this tensor with its index slots rearranged by `perm`. The symmetry group is
    /// closed and pruned again against the rearranged indices.
    pub fn permuted(&self, perm: &Permutation) -> Self {
        Self::new(&self.name, perm.apply(&self.indices), &self.perms, self.kind)
    }

    /// Returns the Hermitian conjugate of an operator, or a copy of a non-operator tensor.
    pub fn conjugated(&self) -> Self {
        match self.kind {
            TensorKind::SpinFreeOperator => {
                let k = self.indices.len() / 2;
                let indices = self.indices[k..]
                    .iter()
                    .chain(self.indices[..k].iter())
                    .cloned()
                    .collect();
                self.with_indices(indices)
            }
            TensorKind::CreationOperator => Self {
                name: if self.name == "C" { "D".to_string() } else { self.name.clone() },
                kind: TensorKind::DestroyOperator,
                ..self.clone()
            },
            TensorKind::DestroyOperator => Self {
                name: if self.name == "D" { "C".to_string() } else { self.name.clone() },
                kind: TensorKind::CreationOperator,
                ..self.clone()
            },
            _ => self.clone(),
        }
    }

    /// Brings the index slots into canonical order.
    ///
    /// Every permutation of the symmetry group is tried and the one giving the lexicographically
    /// smallest index sequence wins. `factor` is negated if the winning permutation is negative.
    pub fn sort(&self, factor: &mut f64) -> Self {
        let mut best = self.indices.clone();
        let mut winner = None;
        for perm in self.perms.iter() {
            let candidate = perm.apply(&self.indices);
            if candidate < best {
                best = candidate;
                winner = Some(perm);
            }
        }
        match winner {
            Some(perm) => {
                if perm.is_negative() {
                    *factor = -*factor;
                }
                self.permuted(perm)
            }
            None => self.clone(),
        }
    }

    /// Brings the index slots into canonical order after relabelling dummy indices.
    ///
    /// Dummy indices already labelled in a labelling keep their label; the remaining ones receive
    /// consecutive labels starting from `new_label`, in order of appearance. The smallest
    /// relabelled index sequence over every symmetry permutation and every labelling in
    /// `labellings` is returned.
    ///
    /// # Arguments
    ///
    /// * `ctr_indices` - The dummy indices of the enclosing term.
    /// * `labellings` - The candidate labellings built up by the tensors canonicalised so far.
    /// * `new_label` - The first unused label. On return this is advanced past the labels
    /// introduced by this tensor.
    ///
    /// # Panics
    ///
    /// Panics if `labellings` is empty.
    pub fn sort_with_dummies(
        &self,
        ctr_indices: &BTreeSet<Index>,
        labellings: &[DummyLabelling],
        new_label: &mut usize,
    ) -> Self {
        assert!(!labellings.is_empty(), "No dummy labelling to sort against.");
        let (mut best, _, next_label) =
            relabel(&self.indices, ctr_indices, &labellings[0].labels, *new_label);
        let mut winner = None;
        for perm in self.perms.iter() {
            let permuted = perm.apply(&self.indices);
            for labelling in labellings.iter() {
                let (candidate, _, _) =
                    relabel(&permuted, ctr_indices, &labelling.labels, *new_label);
                if candidate < best {
                    best = candidate;
                    winner = Some(perm);
                }
            }
        }
        *new_label = next_label;
        winner
            .map_or_else(|| self.clone(), |perm| self.permuted(perm))
            .with_indices(best)
    }

    /// Enumerates the refined labellings under which this tensor reproduces `reference`.
    ///
    /// # Arguments
    ///
    /// * `reference` - The canonical form chosen for this tensor by [`Self::sort_with_dummies`].
    /// * `ctr_indices` - The dummy indices of the enclosing term.
    /// * `labellings` - The candidate labellings before this tensor was canonicalised.
    /// * `new_label` - The first label unused before this tensor was canonicalised.
    ///
    /// # Returns
    ///
    /// The distinct extended labellings, in ascending order, each with its sign updated by the
    /// permutation that realises it.
    pub fn sort_gen_maps(
        &self,
        reference: &Tensor,
        ctr_indices: &BTreeSet<Index>,
        labellings: &[DummyLabelling],
        new_label: usize,
    ) -> Vec<DummyLabelling> {
        let mut refined = BTreeSet::new();
        for perm in self.perms.iter() {
            let permuted = perm.apply(&self.indices);
            for labelling in labellings.iter() {
                let (candidate, mut fresh, _) =
                    relabel(&permuted, ctr_indices, &labelling.labels, new_label);
                if candidate == reference.indices {
                    fresh.extend(labelling.labels.iter().map(|(k, v)| (k.clone(), *v)));
                    let sign = if perm.is_negative() {
                        -labelling.sign
                    } else {
                        labelling.sign
                    };
                    refined.insert(DummyLabelling {
                        labels: fresh,
                        sign,
                    });
                }
            }
        }
        refined.into_iter().collect()
    }

    /// Renders the tensor with its slots rearranged by `perm`.
    fn to_str(&self, perm: &Permutation) -> String {
        let d = if self.indices.iter().all(Index::is_short) {
            ""
        } else {
            " "
        };
        let half = self.indices.len() / 2;
        let body = perm
            .image()
            .iter()
            .enumerate()
            .map(|(i, &pi)| {
                let sep = if self.kind == TensorKind::SpinFreeOperator && i == half && i > 0 {
                    format!(",{d}")
                } else {
                    String::new()
                };
                format!("{sep}{}{d}", self.indices[pi])
            })
            .join("");
        format!(
            "{}{}[{d}{body}]",
            if perm.is_negative() { "-" } else { "" },
            self.name
        )
    }

    /// Lists every member of the symmetry group as an equality between index arrangements.
    pub fn permutation_rules(&self) -> String {
        self.perms.iter().map(|perm| self.to_str(perm)).join(" == ")
    }

    /// Position of an operator relative to the Fermi level, as seen from the occupied space
    /// `occ`. Holes and particles are told apart by whether the first index lies in `occ`.
    fn fermi_type(&self, occ: IndexTypes) -> u8 {
        let x = u8::from(self.kind == TensorKind::DestroyOperator);
        let y = u8::from(
            self.indices
                .first()
                .map_or(false, |idx| idx.types().intersects(occ)),
        );
        x | ((x ^ y) << 1)
    }

    /// Returns `true` if this operator stands to the left of `other` in normal order.
    ///
    /// The occupied space is decided pairwise from the first indices of both operators; inactive
    /// orbitals are occupied unless both operators act on the active space. Operators on the same
    /// side of the Fermi level fall back to the order of names, kinds and indices.
    ///
    /// This relation is not guaranteed to be transitive across mixed orbital spaces, so it must
    /// not be handed to the standard sorting routines.
    pub fn normal_order_lt(&self, other: &Tensor) -> bool {
        let space_of = |t: &Tensor| {
            t.indices
                .first()
                .map_or(IndexTypes::NONE, |idx| idx.types().space())
        };
        let (x, y) = (space_of(self), space_of(other));
        let (lo, hi) = (x.min(y), x.max(y));
        let occ = if lo.is_none()
            || lo == IndexTypes::EXTERNAL
            || (lo == IndexTypes::ACTIVE && hi == IndexTypes::ACTIVE)
        {
            IndexTypes::INACTIVE
        } else {
            lo
        };
        let (fx, fy) = (self.fermi_type(occ), other.fermi_type(occ));
        if fx != fy {
            fx < fy
        } else {
            self.cmp(other) == Ordering::Less
        }
    }
}

/// Renames the dummy indices in `indices` to their integer labels.
///
/// Returns the relabelled indices, the labels newly assigned to previously unlabelled dummy
/// indices, and the next unused label.
fn relabel(
    indices: &[Index],
    ctr_indices: &BTreeSet<Index>,
    labels: &BTreeMap<Index, usize>,
    new_label: usize,
) -> (Vec<Index>, BTreeMap<Index, usize>, usize) {
    let mut fresh = BTreeMap::new();
    let mut next_label = new_label;
    let relabelled = indices
        .iter()
        .map(|idx| {
            if !ctr_indices.contains(idx) {
                return idx.clone();
            }
            let label = match labels.get(idx) {
                Some(&label) => label,
                None => *fresh.entry(idx.clone()).or_insert_with(|| {
                    next_label += 1;
                    next_label - 1
                }),
            };
            Index::dummy_label(label, idx.types())
        })
        .collect();
    (relabelled, fresh, next_label)
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.name == other.name && self.indices == other.indices
    }
}

impl Eq for Tensor {}

impl Hash for Tensor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.kind.hash(state);
        self.name.hash(state);
        self.indices.hash(state);
    }
}

impl PartialOrd for Tensor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tensor {
    /// Orders tensors by name, then kind, then indices.
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.name, self.kind, &self.indices).cmp(&(&other.name, other.kind, &other.indices))
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_str(&Permutation::identity(self.indices.len())))
    }
}
