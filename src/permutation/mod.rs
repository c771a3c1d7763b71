//! Signed permutations of tensor index slots and their group closure.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::ops::Mul;

use derive_builder::Builder;
use indexmap::IndexSet;
use log;
use num_traits::Inv;
use serde::{Deserialize, Serialize};

mod generators;

pub use generators::{
    four_anti, full_anti, non_symmetric, pair_symmetric, qc_chem, qc_phys, two_symmetric,
};

#[cfg(test)]
mod permutation_tests;

/// A structure to manage signed permutation actions on the index slots of a tensor.
#[derive(Builder, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Permutation {
    /// The rank of the permutation, *i.e.* the number of slots on which the permutation acts.
    rank: usize,

    /// If the permutation is to act on an ordered sequence of $`n`$ slots, $`0, 1, \ldots, n`$
    /// where $`n`$ is [`Self::rank`], then slot $`i`$ of the result is filled from slot
    /// `image[i]` of the source.
    #[builder(setter(custom))]
    image: Vec<usize>,

    /// Boolean indicating if the permutation flips the sign of the tensor it acts on.
    #[builder(default = "false")]
    negative: bool,
}

impl PermutationBuilder {
    fn image(&mut self, perm: &[usize]) -> &mut Self {
        assert_eq!(
            self.rank
                .expect("The rank for this permutation has not been set."),
            perm.len(),
            "The permutation image `{perm:?}` does not contain the expected number of elements",
        );
        self.image = Some(perm.to_vec());
        self
    }
}

impl Permutation {
    /// Returns a builder to construct a new permutation.
    #[must_use]
    fn builder() -> PermutationBuilder {
        PermutationBuilder::default()
    }

    /// Constructs a signed permutation from its image.
    ///
    /// # Panics
    ///
    /// Panics if `image` is not a rearrangement of `0..image.len()`.
    pub fn new(image: &[usize], negative: bool) -> Self {
        assert!(
            image.len() == image.iter().cloned().collect::<HashSet<usize>>().len()
                && image.iter().all(|&i| i < image.len()),
            "`{image:?}` is not a valid permutation image."
        );
        Self::builder()
            .rank(image.len())
            .image(image)
            .negative(negative)
            .build()
            .unwrap_or_else(|err| {
                log::error!("{err}");
                panic!("Unable to construct a `Permutation` from `{image:?}`.")
            })
    }

    /// Constructs a sign-preserving permutation from its image.
    pub fn from_image(image: &[usize]) -> Self {
        Self::new(image, false)
    }

    /// Constructs the identity permutation of a given rank.
    pub fn identity(rank: usize) -> Self {
        Self::from_image(&(0..rank).collect::<Vec<_>>())
    }

    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn image(&self) -> &[usize] {
        &self.image
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    /// Returns `true` if this permutation is the sign-preserving identity for this rank.
    pub fn is_identity(&self) -> bool {
        !self.negative && self.image.iter().enumerate().all(|(i, &x)| i == x)
    }

    /// Rearranges `items` so that slot `i` of the result holds `items[image[i]]`.
    ///
    /// # Panics
    ///
    /// Panics if the number of items does not match the rank.
    pub fn apply<T: Clone>(&self, items: &[T]) -> Vec<T> {
        assert_eq!(
            items.len(),
            self.rank,
            "The number of items does not match the permutation rank."
        );
        self.image.iter().map(|&i| items[i].clone()).collect()
    }

    /// Closes a generating set into the complete signed permutation group.
    ///
    /// The closure proceeds breadth-first from the identity, right-multiplying every element
    /// found so far by every generator until no new element appears. The identity is always the
    /// first element of the result.
    ///
    /// # Arguments
    ///
    /// * `rank` - The rank of the permutations.
    /// * `generators` - The generating set.
    ///
    /// # Returns
    ///
    /// The group elements in discovery order.
    pub fn complete_set(rank: usize, generators: &[Permutation]) -> Vec<Permutation> {
        let mut group = IndexSet::from([Permutation::identity(rank)]);
        let mut k = 0;
        while k < group.len() {
            let g = group[k].clone();
            for gen in generators.iter() {
                group.insert(&g * gen);
            }
            k += 1;
        }
        log::debug!(
            "Closed {} generator(s) of rank {rank} into a group of order {}.",
            generators.len(),
            group.len()
        );
        group.into_iter().collect()
    }
}

impl PartialOrd for Permutation {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Permutation {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.negative, &self.image).cmp(&(other.negative, &other.image))
    }
}

impl fmt::Display for Permutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "< {} ", if self.negative { "-" } else { "+" })?;
        for i in self.image.iter() {
            write!(f, "{i} ")?;
        }
        write!(f, ">")
    }
}

// ---
// Mul
// ---
impl Mul<&'_ Permutation> for &Permutation {
    type Output = Permutation;

    fn mul(self, rhs: &Permutation) -> Self::Output {
        assert_eq!(
            self.rank, rhs.rank,
            "The ranks of two multiplying permutations do not match."
        );
        Self::Output::builder()
            .rank(self.rank)
            .image(
                &rhs.image
                    .iter()
                    .map(|&ri| self.image[ri])
                    .collect::<Vec<usize>>(),
            )
            .negative(self.negative ^ rhs.negative)
            .build()
            .expect("Unable to construct a product `Permutation`.")
    }
}

impl Mul<&'_ Permutation> for Permutation {
    type Output = Permutation;

    fn mul(self, rhs: &Permutation) -> Self::Output {
        &self * rhs
    }
}

impl Mul<Permutation> for Permutation {
    type Output = Permutation;

    fn mul(self, rhs: Permutation) -> Self::Output {
        &self * &rhs
    }
}

impl Mul<Permutation> for &Permutation {
    type Output = Permutation;

    fn mul(self, rhs: Permutation) -> Self::Output {
        self * &rhs
    }
}

// ---
// Inv
// ---
impl Inv for &Permutation {
    type Output = Permutation;

    fn inv(self) -> Self::Output {
        let mut image_inv = (0..self.rank).collect::<Vec<_>>();
        image_inv.sort_by_key(|&i| self.image[i]);
        Self::Output::builder()
            .rank(self.rank)
            .image(&image_inv)
            .negative(self.negative)
            .build()
            .expect("Unable to construct an inverse `Permutation`.")
    }
}

impl Inv for Permutation {
    type Output = Permutation;

    fn inv(self) -> Self::Output {
        (&self).inv()
    }
}
