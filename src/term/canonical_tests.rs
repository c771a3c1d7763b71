use approx::assert_abs_diff_eq;
use itertools::Itertools;

use crate::index::{Index, IndexTypeMap, IndexTypes};
use crate::permutation::{four_anti, qc_chem, two_symmetric};
use crate::tensor::PermutationRuleMap;
use crate::term::Term;

fn rules() -> PermutationRuleMap {
    let mut rules = PermutationRuleMap::new();
    rules.insert(("h".to_string(), 2), two_symmetric());
    rules.insert(("g".to_string(), 4), qc_chem());
    rules.insert(("w".to_string(), 4), four_anti());
    rules
}

fn parse(text: &str) -> Term {
    Term::parse(text, &IndexTypeMap::new(), &rules()).unwrap()
}

fn tensor_strings(term: &Term) -> Vec<String> {
    term.tensors().iter().map(|t| t.to_string()).collect()
}

#[test]
fn test_quick_sort_relabels_dummies() {
    let sorted = parse("SUM <pq> h[qp] C[p] D[q]").quick_sort();
    assert_eq!(tensor_strings(&sorted), ["h[01]", "C[0]", "D[1]"]);
    assert_eq!(sorted.ctr_indices(), &Index::parse_set("01"));
    assert_abs_diff_eq!(sorted.factor(), 1.0);

    // Free indices are kept.
    let sorted = parse("SUM <k> t[ka] u[kb]").quick_sort();
    assert_eq!(tensor_strings(&sorted), ["t[0a]", "u[0b]"]);
}

#[test]
fn test_quick_sort_equivalent_terms() {
    let a = parse("SUM <ij> g[ij] g[ji] t[i]").quick_sort();
    let b = parse("SUM <ij> g[ji] g[ij] t[j]").quick_sort();
    assert_eq!(a, b);

    let a = parse("SUM <ab> v[ab] t[ba]").quick_sort();
    let b = parse("SUM <cd> t[dc] v[cd]").quick_sort();
    assert_eq!(a, b);

    let a = parse("SUM <pqrs> g[pqrs] x[pq] y[rs]").quick_sort();
    let b = parse("SUM <pqrs> g[srqp] y[pq] x[sr]").quick_sort();
    assert_eq!(a.tensors(), b.tensors());
    assert_abs_diff_eq!(a.factor(), b.factor());

    let a = parse("SUM <ab> t[ab]").quick_sort();
    let b = parse("SUM <ab> t[ba]").quick_sort();
    assert_eq!(a, b);

    let a = parse("SUM <i> t[ia]").quick_sort();
    let b = parse("SUM <i> t[ai]").quick_sort();
    assert_ne!(a, b);
}

#[test]
fn test_quick_sort_sign() {
    let a = parse("SUM <pq> w[pqrs] x[p] y[q]").quick_sort();
    let b = parse("SUM <pq> w[qprs] x[q] y[p]").quick_sort();
    let c = parse("SUM <pq> w[qprs] x[p] y[q]").quick_sort();
    assert_eq!(tensor_strings(&a), ["w[01rs]", "x[0]", "y[1]"]);
    assert_eq!(a, b);
    assert!(a.abs_equal_to(&c));
    assert_abs_diff_eq!(a.factor(), 1.0);
    assert_abs_diff_eq!(c.factor(), -1.0);

    let sorted = parse("w[qpsr]").quick_sort();
    assert_eq!(tensor_strings(&sorted), ["w[pqrs]"]);
    assert_abs_diff_eq!(sorted.factor(), 1.0);
    let sorted = parse("2.0 w[qprs]").quick_sort();
    assert_abs_diff_eq!(sorted.factor(), -2.0);
}

#[test]
fn test_quick_sort_idempotent() {
    let mut map = IndexTypeMap::new();
    map.insert(IndexTypes::INACTIVE, Index::parse_set("ijkl"));
    map.insert(IndexTypes::EXTERNAL, Index::parse_set("abcd"));
    for text in [
        "SUM <pq> h[qp] C[p] D[q]",
        "SUM <ijab> w[ijab] t[ia] t[jb]",
        "0.5 SUM <ijkl> g[ijkl] g[klij] delta[ik]",
        "SUM <ab> E2[ab,ij] t[ba]",
        "SUM <ia> t[ia] C[a] D[i]",
    ] {
        let term = Term::parse(text, &map, &rules()).unwrap();
        let once = term.quick_sort();
        assert_eq!(once.quick_sort(), once, "{text}");
    }
}

#[test]
#[should_panic]
fn test_quick_sort_unused_dummy() {
    parse("SUM <pz> h[pq]").quick_sort();
}

#[test]
fn test_simple_sort() {
    let sorted = parse("SUM <pq> w[qprs] h[qp] C[p] D[q]").simple_sort();
    assert_eq!(tensor_strings(&sorted), ["h[pq]", "w[pqrs]", "C[p]", "D[q]"]);
    assert_eq!(sorted.ctr_indices(), &Index::parse_set("pq"));
    assert_abs_diff_eq!(sorted.factor(), -1.0);
}

#[test]
fn test_old_sort_agrees_with_quick_sort() {
    let pairs = [
        ("SUM <ij> g[ij] g[ji] t[i]", "SUM <ij> g[ji] g[ij] t[j]"),
        ("SUM <pq> w[pqrs] x[p] y[q]", "SUM <pq> w[qprs] x[q] y[p]"),
        ("SUM <pqrs> g[pqrs] x[pq] y[rs]", "SUM <pqrs> g[srqp] y[pq] x[sr]"),
        ("SUM <ab> t[ab] C[a] D[b]", "SUM <cd> t[dc] C[d] D[c]"),
    ];
    for (x, y) in pairs {
        let (x, y) = (parse(x), parse(y));
        assert_eq!(x.old_sort(), y.old_sort());
        assert_eq!(x.quick_sort(), y.quick_sort());
        assert_abs_diff_eq!(x.old_sort().factor(), x.quick_sort().factor());
    }

    let a = parse("SUM <pq> w[pqrs] x[p] y[q]").old_sort();
    let c = parse("SUM <pq> w[qprs] x[p] y[q]").old_sort();
    assert!(a.abs_equal_to(&c));
    assert_abs_diff_eq!(a.factor(), -c.factor());
}

#[test]
fn test_quick_sort_relabelling_invariance() {
    let base = "SUM <abcd> g[abcd] t[ac] u[bd] C[a] D[d]";
    let reference = parse(base).quick_sort();
    for image in "abcd".chars().permutations(4) {
        let renamed = base
            .chars()
            .map(|c| match "abcd".find(c) {
                Some(pos) => image[pos],
                None => c,
            })
            .collect::<String>();
        assert_eq!(parse(&renamed).quick_sort(), reference, "{renamed}");
    }
}
