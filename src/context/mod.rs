//! Index spaces, tensor symmetries and named definitions shared by the expressions of a
//! calculation.

use std::fmt;

use anyhow::{self, bail, format_err};
use derive_builder::Builder;
use itertools::Itertools;
use log;
use serde::{Deserialize, Serialize};

use crate::expression::{Definitions, Expr};
use crate::index::{Index, IndexTypeMap, IndexTypes};
use crate::permutation::{
    four_anti, full_anti, non_symmetric, pair_symmetric, qc_chem, qc_phys, two_symmetric,
    Permutation,
};
use crate::tensor::{PermutationRuleMap, Tensor};


// ==================
// Struct definitions
// ==================

// ----------------
// Symmetry presets
// ----------------

/// An enumerated type for the index-permutation symmetries that can be attached to a generic
/// tensor by name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SymmetryKind {
    /// No symmetry.
    NonSymmetric,

    /// Symmetry under the exchange of the two indices of a matrix.
    TwoSymmetric,

    /// Eightfold symmetry of real two-electron integrals in chemists' notation, `(pq|rs)`.
    QcChem,

    /// Eightfold symmetry of real two-electron integrals in physicists' notation, `<pq|rs>`.
    QcPhys,

    /// Antisymmetry within each index pair of a rank-4 tensor.
    FourAnti,

    /// Full antisymmetry under every permutation of the indices.
    FullAnti,

    /// Simultaneous exchange of index pairs `(i, i + n)` of a rank-`2n` tensor.
    PairSymmetric,

    /// Pair exchange together with the exchange of the two halves of the indices.
    PairHermitian,
}

impl SymmetryKind {
    /// Returns the generators of this symmetry for a tensor with `arity` indices.
    ///
    /// # Errors
    ///
    /// Errors if the symmetry is not defined for the given arity.
    pub fn generators(&self, arity: usize) -> Result<Vec<Permutation>, anyhow::Error> {
        let generators = match (self, arity) {
            (Self::NonSymmetric, _) => non_symmetric(),
            (Self::TwoSymmetric, 2) => two_symmetric(),
            (Self::QcChem, 4) => qc_chem(),
            (Self::QcPhys, 4) => qc_phys(),
            (Self::FourAnti, 4) => four_anti(),
            (Self::FullAnti, n) if n > 0 => full_anti(n),
            (Self::PairSymmetric, n) if n % 2 == 0 => pair_symmetric(n / 2, false),
            (Self::PairHermitian, n) if n % 2 == 0 => pair_symmetric(n / 2, true),
            _ => bail!("Symmetry `{self}` is not defined for tensors with {arity} indices."),
        };
        Ok(generators)
    }
}

impl fmt::Display for SymmetryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NonSymmetric => write!(f, "non-symmetric"),
            Self::TwoSymmetric => write!(f, "two-index symmetric"),
            Self::QcChem => write!(f, "(pq|rs) eightfold"),
            Self::QcPhys => write!(f, "<pq|rs> eightfold"),
            Self::FourAnti => write!(f, "pairwise antisymmetric"),
            Self::FullAnti => write!(f, "fully antisymmetric"),
            Self::PairSymmetric => write!(f, "pair symmetric"),
            Self::PairHermitian => write!(f, "pair symmetric, Hermitian"),
        }
    }
}

/// A rule attaching a symmetry to every generic tensor of a given name and arity.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SymmetryRule {
    /// The tensor name.
    pub tensor: String,

    /// The number of indices of the tensor.
    pub arity: usize,

    /// The symmetry of the tensor.
    pub symmetry: SymmetryKind,
}

// ------------
// Index spaces
// ------------

/// The index names of each orbital space and spin. Names are listed as in tensor literals: one
/// character per index, or whitespace-separated if some name is longer.
///
/// A name may belong to several spaces, in which case it ranges over all of them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexSpaces {
    /// Indices of the inactive (doubly occupied or hole) space.
    #[serde(default)]
    pub inactive: String,

    /// Indices of the active space.
    #[serde(default)]
    pub active: String,

    /// Indices of the external (virtual or particle) space.
    #[serde(default)]
    pub external: String,

    /// Indices of alpha spin.
    #[serde(default)]
    pub alpha: String,

    /// Indices of beta spin.
    #[serde(default)]
    pub beta: String,
}

impl IndexSpaces {
    /// Returns the classification map of these index spaces. Empty spaces are left out.
    pub fn type_map(&self) -> IndexTypeMap {
        [
            (IndexTypes::INACTIVE, &self.inactive),
            (IndexTypes::ACTIVE, &self.active),
            (IndexTypes::EXTERNAL, &self.external),
            (IndexTypes::ALPHA, &self.alpha),
            (IndexTypes::BETA, &self.beta),
        ]
        .into_iter()
        .filter(|(_, names)| !names.trim().is_empty())
        .map(|(types, names)| (types, Index::parse_set(names.trim())))
        .collect()
    }
}

// -------------
// Specification
// -------------

/// A serialisable specification of a [`WickContext`].
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WickContextSpec {
    /// The index names of every space.
    #[serde(default)]
    pub spaces: IndexSpaces,

    /// Symmetries of generic tensors.
    #[serde(default)]
    pub symmetries: Vec<SymmetryRule>,

    /// Definition literals `Name[idx...] = <expression literal>`, in the order in which they are
    /// to be added. A definition may refer to tensors defined before it.
    #[serde(default)]
    pub definitions: Vec<String>,
}

// -------
// Context
// -------

/// A structure holding everything needed to read expressions of a calculation: the
/// classification of index names, the symmetry of generic tensors, and named definitions.
#[derive(Clone, Builder, Debug)]
pub struct WickContext {
    /// The classification of index names.
    #[builder(default = "IndexTypeMap::new()")]
    type_map: IndexTypeMap,

    /// The symmetry generators of generic tensors keyed by name and arity.
    #[builder(default = "PermutationRuleMap::new()")]
    rules: PermutationRuleMap,

    /// Named definitions available for substitution.
    #[builder(default = "Definitions::new()")]
    definitions: Definitions,
}

impl WickContext {
    /// Returns a builder to construct a [`WickContext`] structure.
    pub fn builder() -> WickContextBuilder {
        WickContextBuilder::default()
    }

    /// Constructs a context from its specification.
    ///
    /// Definitions are read in order. Each one is substituted with the definitions preceding it
    /// before it is added.
    ///
    /// # Errors
    ///
    /// Errors if a symmetry is not defined for the arity of its rule, or if a definition cannot
    /// be parsed.
    pub fn from_spec(spec: &WickContextSpec) -> Result<Self, anyhow::Error> {
        let rules = spec
            .symmetries
            .iter()
            .map(|rule| {
                let generators = rule.symmetry.generators(rule.arity)?;
                Ok::<_, anyhow::Error>(((rule.tensor.clone(), rule.arity), generators))
            })
            .collect::<Result<PermutationRuleMap, anyhow::Error>>()?;
        let mut ctx = Self::builder()
            .type_map(spec.spaces.type_map())
            .rules(rules)
            .build()
            .map_err(|err| format_err!(err))?;
        for def in spec.definitions.iter() {
            ctx.add_definition(def)?;
        }
        log::debug!(
            "Context constructed with {} index space(s), {} symmetry rule(s) and {} definition(s).",
            ctx.type_map.len(),
            ctx.rules.len(),
            ctx.definitions.len()
        );
        Ok(ctx)
    }

    pub fn type_map(&self) -> &IndexTypeMap {
        &self.type_map
    }

    pub fn rules(&self) -> &PermutationRuleMap {
        &self.rules
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    /// Parses an index list with the classifications of this context.
    pub fn parse_indices(&self, text: &str) -> Vec<Index> {
        Index::parse_with_types(text, &self.type_map)
    }

    /// Parses a tensor literal with the classifications and symmetries of this context.
    pub fn parse_tensor(&self, text: &str) -> Result<Tensor, anyhow::Error> {
        Tensor::parse(text, &self.type_map, &self.rules).map_err(|err| format_err!(err))
    }

    /// Parses an expression literal with the classifications and symmetries of this context.
    pub fn parse_expr(&self, text: &str) -> Result<Expr, anyhow::Error> {
        Expr::parse(text, &self.type_map, &self.rules).map_err(|err| format_err!(err))
    }

    /// Parses a definition literal, substitutes the definitions already present into its
    /// right-hand side and adds it under the name of its left-hand side.
    ///
    /// # Errors
    ///
    /// Errors if the literal cannot be parsed or if the name is already defined.
    pub fn add_definition(&mut self, text: &str) -> Result<(), anyhow::Error> {
        let (tensor, expr) = Expr::parse_def(text, &self.type_map, &self.rules)
            .map_err(|err| format_err!(err))?;
        let name = tensor.name().to_string();
        if self.definitions.contains_key(&name) {
            bail!("Tensor `{name}` is defined more than once.");
        }
        let expr = expr.substitute(&self.definitions);
        log::debug!("Definition of `{tensor}` added with {} term(s).", expr.len());
        self.definitions.insert(name, (tensor, expr));
        Ok(())
    }
}

impl fmt::Display for WickContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Index spaces:")?;
        for (types, indices) in self.type_map.iter() {
            writeln!(f, "  {types}: {}", indices.iter().join(" "))?;
        }
        if !self.rules.is_empty() {
            writeln!(f, "Tensor symmetries:")?;
            for ((name, arity), perms) in self.rules.iter() {
                writeln!(
                    f,
                    "  {name} ({arity} indices): {} generator(s)",
                    perms.len()
                )?;
            }
        }
        if !self.definitions.is_empty() {
            writeln!(f, "Definitions:")?;
            for (tensor, expr) in self.definitions.values() {
                writeln!(f, "  {tensor} ({} term(s))", expr.len())?;
            }
        }
        Ok(())
    }
}
