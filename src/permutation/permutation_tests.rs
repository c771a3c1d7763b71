use itertools::Itertools;
use num_traits::Inv;

use crate::permutation::{
    four_anti, full_anti, non_symmetric, pair_symmetric, qc_chem, qc_phys, two_symmetric,
    Permutation,
};

#[test]
fn test_permutation_composition() {
    let p_01234 = Permutation::from_image(&[0, 1, 2, 3, 4]);
    let p_32104 = Permutation::from_image(&[3, 2, 1, 0, 4]);
    assert!(p_01234.is_identity());
    assert!(!p_32104.is_identity());
    assert_eq!(p_32104, &p_01234 * &p_32104);
    assert_eq!(p_32104, &p_32104 * &p_01234);

    let p_04213 = Permutation::from_image(&[0, 4, 2, 1, 3]);
    let p_34120 = Permutation::from_image(&[3, 4, 1, 2, 0]);
    let p_12403 = Permutation::from_image(&[1, 2, 4, 0, 3]);
    assert_eq!(p_34120, &p_32104 * &p_04213);
    assert_eq!(p_12403, &p_04213 * &p_32104);

    let neg = Permutation::new(&[1, 0], true);
    assert!((&neg * &neg).is_identity());
    assert!((&neg * Permutation::identity(2)).is_negative());
}

#[test]
fn test_permutation_apply() {
    let p = Permutation::from_image(&[2, 0, 1]);
    assert_eq!(p.apply(&['a', 'b', 'c']), vec!['c', 'a', 'b']);

    // Applying a product is applying the right factor to the result of the left factor.
    let q = Permutation::from_image(&[1, 0, 2]);
    let items = ['a', 'b', 'c'];
    assert_eq!((&p * &q).apply(&items), q.apply(&p.apply(&items)));
}

#[test]
fn test_permutation_inverse() {
    let rank = 5;
    for image in (0..rank).permutations(rank) {
        let perm = Permutation::new(&image, true);
        let inv = (&perm).inv();
        assert!(inv.is_negative());
        let prod = &perm * &inv;
        assert_eq!(prod.image(), &(0..rank).collect::<Vec<_>>()[..]);
        assert!(!prod.is_negative());
    }
}

#[test]
#[should_panic]
fn test_permutation_invalid_image() {
    Permutation::from_image(&[0, 0, 1]);
}

#[test]
fn test_permutation_order() {
    let pos = Permutation::from_image(&[1, 0]);
    let neg = Permutation::new(&[0, 1], true);
    assert!(pos < neg);
    assert!(Permutation::identity(2) < pos);
    assert_eq!(pos.to_string(), "< + 1 0 >");
    assert_eq!(neg.to_string(), "< - 0 1 >");
}

#[test]
fn test_permutation_complete_set() {
    let group = Permutation::complete_set(4, &non_symmetric());
    assert_eq!(group.len(), 1);
    assert!(group[0].is_identity());

    assert_eq!(Permutation::complete_set(2, &two_symmetric()).len(), 2);
    assert_eq!(Permutation::complete_set(4, &qc_chem()).len(), 8);
    assert_eq!(Permutation::complete_set(4, &qc_phys()).len(), 8);

    let group = Permutation::complete_set(4, &four_anti());
    assert_eq!(group.len(), 4);
    assert_eq!(group.iter().filter(|p| p.is_negative()).count(), 2);

    let group = Permutation::complete_set(4, &full_anti(4));
    assert_eq!(group.len(), 24);
    assert!(group[0].is_identity());
    for perm in group.iter() {
        let inversions = (0..4)
            .tuple_combinations()
            .filter(|&(i, j)| perm.image()[i] > perm.image()[j])
            .count();
        assert_eq!(perm.is_negative(), inversions % 2 == 1);
    }

    assert_eq!(Permutation::complete_set(4, &pair_symmetric(2, false)).len(), 2);
    assert_eq!(Permutation::complete_set(4, &pair_symmetric(2, true)).len(), 4);
    assert_eq!(Permutation::complete_set(6, &pair_symmetric(3, false)).len(), 6);
    assert_eq!(Permutation::complete_set(6, &pair_symmetric(3, true)).len(), 12);
}

#[test]
fn test_permutation_pair_symmetric_generators() {
    let gens = pair_symmetric(3, true);
    assert_eq!(gens.len(), 3);
    assert_eq!(gens[0].image(), &[1, 0, 2, 4, 3, 5]);
    assert_eq!(gens[1].image(), &[2, 1, 0, 5, 4, 3]);
    assert_eq!(gens[2].image(), &[3, 4, 5, 0, 1, 2]);
    assert!(pair_symmetric(1, false).is_empty());
}
