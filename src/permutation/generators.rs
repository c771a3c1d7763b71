//! Standard generating sets for tensor index symmetries.

use super::Permutation;

/// No symmetry.
pub fn non_symmetric() -> Vec<Permutation> {
    vec![]
}

/// Symmetry under exchange of the two slots of a rank-2 tensor.
pub fn two_symmetric() -> Vec<Permutation> {
    vec![Permutation::from_image(&[1, 0])]
}

/// Eight-fold symmetry of real two-electron integrals in chemists' notation, $`(pq|rs)`$.
pub fn qc_chem() -> Vec<Permutation> {
    vec![
        Permutation::from_image(&[2, 3, 0, 1]),
        Permutation::from_image(&[1, 0, 2, 3]),
        Permutation::from_image(&[0, 1, 3, 2]),
    ]
}

/// Eight-fold symmetry of real two-electron integrals in physicists' notation, $`\langle pq|rs
/// \rangle`$.
pub fn qc_phys() -> Vec<Permutation> {
    vec![
        Permutation::from_image(&[0, 3, 2, 1]),
        Permutation::from_image(&[2, 1, 0, 3]),
        Permutation::from_image(&[1, 0, 3, 2]),
    ]
}

/// Antisymmetry within the first and within the second pair of slots of a rank-4 tensor, as for
/// antisymmetrised integrals $`\langle pq||rs \rangle`$. The generated group has order 4.
pub fn four_anti() -> Vec<Permutation> {
    vec![
        Permutation::new(&[1, 0, 2, 3], true),
        Permutation::new(&[0, 1, 3, 2], true),
    ]
}

/// Full antisymmetry over `n` slots, generated by the signed adjacent transpositions. The
/// generated group is the symmetric group of order $`n!`$ with alternating sign.
pub fn full_anti(n: usize) -> Vec<Permutation> {
    (1..n)
        .map(|i| {
            let mut image = (0..n).collect::<Vec<_>>();
            image.swap(i - 1, i);
            Permutation::new(&image, true)
        })
        .collect()
}

/// Exchange symmetry of the `n` index pairs $`(i, i + n)`$ of a rank-$`2n`$ tensor.
///
/// # Arguments
///
/// * `n` - The number of index pairs.
/// * `hermitian` - If `true`, the exchange of the first half of the slots with the second half
/// is added to the generators.
pub fn pair_symmetric(n: usize, hermitian: bool) -> Vec<Permutation> {
    let mut gens = (1..n)
        .map(|i| {
            let swap = |j: usize| {
                if j == 0 {
                    i
                } else if j == i {
                    0
                } else {
                    j
                }
            };
            let image = (0..n)
                .map(swap)
                .chain((0..n).map(|j| swap(j) + n))
                .collect::<Vec<_>>();
            Permutation::from_image(&image)
        })
        .collect::<Vec<_>>();
    if hermitian {
        let image = (n..2 * n).chain(0..n).collect::<Vec<_>>();
        gens.push(Permutation::from_image(&image));
    }
    gens
}
