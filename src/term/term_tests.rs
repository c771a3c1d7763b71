use std::collections::BTreeSet;

use approx::assert_abs_diff_eq;

use crate::index::{Index, IndexTypeMap, IndexTypes};
use crate::permutation::four_anti;
use crate::tensor::{PermutationRuleMap, Tensor, TensorKind};
use crate::term::{Term, TermDefinitions};

fn parse(text: &str) -> Term {
    Term::parse(text, &IndexTypeMap::new(), &PermutationRuleMap::new()).unwrap()
}

fn tensor_strings(term: &Term) -> Vec<String> {
    term.tensors().iter().map(|t| t.to_string()).collect()
}

#[test]
fn test_term_parse() {
    let term = parse("SUM <pq> h[pq] C[p] D[q]");
    assert_eq!(term.ctr_indices(), &Index::parse_set("pq"));
    assert_eq!(tensor_strings(&term), ["h[pq]", "C[p]", "D[q]"]);
    assert_abs_diff_eq!(term.factor(), 1.0);

    let term = parse("\\sum_{ij} t_{ij} f[ji]");
    assert_eq!(term.ctr_indices(), &Index::parse_set("ij"));
    assert_eq!(tensor_strings(&term), ["t[ij]", "f[ji]"]);

    let term = parse("SUM < p1 q1 > h[p1 q1]");
    assert_eq!(term.ctr_indices().len(), 2);
    assert_eq!(term.tensors()[0].indices()[1].name(), "q1");
}

#[test]
fn test_term_parse_factor() {
    assert_abs_diff_eq!(parse("-2.5 v[pqrs]").factor(), -2.5);
    assert_abs_diff_eq!(parse("(0.25) SUM <ij> v[ijij]").factor(), 0.25);
    assert_abs_diff_eq!(parse("- E1[b,a]").factor(), -1.0);
    assert_abs_diff_eq!(parse("+ delta[ab]").factor(), 1.0);
    assert_abs_diff_eq!(parse("- 2.0 delta[pb] E1[a,q]").factor(), -2.0);
    assert_abs_diff_eq!(parse("(   -1.5000000000) t[ab]").factor(), -1.5);
}

#[test]
fn test_term_parse_type_tags() {
    let term = parse("SUM <pq|IE> h[pq] C[p] D[q]");
    let expected = [
        Index::new("p", IndexTypes::INACTIVE),
        Index::new("q", IndexTypes::EXTERNAL),
    ];
    assert_eq!(
        term.ctr_indices(),
        &expected.iter().cloned().collect::<BTreeSet<_>>()
    );
    assert_eq!(term.tensors()[0].indices(), &expected);
    assert_eq!(term.tensors()[2].indices()[0].types(), IndexTypes::EXTERNAL);

    let term = parse("SUM < p1 q1 | IA E > h[p1 q1]");
    assert_eq!(
        term.tensors()[0].indices()[0].types(),
        IndexTypes::INACTIVE | IndexTypes::ACTIVE
    );

    // Tags override the classification given by the index map.
    let mut map = IndexTypeMap::new();
    map.insert(IndexTypes::INACTIVE, Index::parse_set("pq"));
    let term = Term::parse("SUM <p|A> t[pq]", &map, &PermutationRuleMap::new()).unwrap();
    assert_eq!(
        term.tensors()[0].indices(),
        &[
            Index::new("p", IndexTypes::ACTIVE),
            Index::new("q", IndexTypes::INACTIVE)
        ]
    );
}

#[test]
fn test_term_parse_errors() {
    let map = IndexTypeMap::new();
    let rules = PermutationRuleMap::new();
    assert!(Term::parse("2.0.1 h[pq]", &map, &rules).is_err());
    assert!(Term::parse("h[pq", &map, &rules).is_err());
    assert!(Term::parse("SUM <pq h[pq]", &map, &rules).is_err());
    assert!(Term::parse("SUM <pq|I> h[pq]", &map, &rules).is_err());
    assert!(Term::parse("SUM <pq|IX> h[pq]", &map, &rules).is_err());
    assert!(Term::parse("E2[pq] h[pq]", &map, &rules).is_err());
}

#[test]
fn test_term_display() {
    let term = parse("SUM <pq> h[pq] C[p] D[q]");
    assert_eq!(term.to_string(), "(    1.0000000000) SUM <pq> h[pq] C[p] D[q]");
    assert_eq!(
        parse("-0.5 E2[ij,ab]").to_string(),
        "(   -0.5000000000) E2[ij,ab]"
    );

    let term = parse("SUM <pq|IE> h[pq]");
    assert_eq!(term.to_string(), "(    1.0000000000) SUM <pq|IE> h[pq]");
    let term = parse("SUM <pq|IA E> h[pq]");
    assert_eq!(term.to_string(), "(    1.0000000000) SUM <pq|IA E> h[pq]");

    // The rendering parses back to the same term.
    for text in [
        "SUM <pq|IE> h[pq] C[p] D[q]",
        "SUM < p1 q1 > h[ p1 q1 ]",
        "-3.0 delta[ab] t[ba]",
    ] {
        let term = parse(text);
        assert_eq!(parse(&term.to_string()), term);
    }
}

#[test]
fn test_term_mul_renames_dummies() {
    let a = parse("SUM <p> t[p] C[p]");
    let b = parse("2.0 SUM <p> u[p] D[p]");
    let ab = &a * &b;
    assert_eq!(tensor_strings(&ab), ["t[p]", "C[p]", "u[q]", "D[q]"]);
    assert_eq!(ab.ctr_indices(), &Index::parse_set("pq"));
    assert_abs_diff_eq!(ab.factor(), 2.0);

    // A dummy index of the left operand that is free on the right is renamed.
    let a = parse("SUM <i> t[ia]");
    let b = parse("f[i]");
    let ab = a * b;
    assert_eq!(tensor_strings(&ab), ["t[ja]", "f[i]"]);
    assert_eq!(ab.ctr_indices(), &Index::parse_set("j"));

    // Disjoint operands are concatenated untouched.
    let ab = &parse("SUM <i> t[ia]") * &parse("SUM <j> u[jb]");
    assert_eq!(tensor_strings(&ab), ["t[ia]", "u[jb]"]);

    let scaled = parse("t[ia]") * -0.5;
    assert_abs_diff_eq!(scaled.factor(), -0.5);
    assert_abs_diff_eq!(scaled.abs().factor(), 1.0);

    let (a, b) = (parse("SUM <p> t[p] C[p]"), parse("SUM <p> u[p] D[p]"));
    assert_eq!(a.clone() * &b, &a * &b);
    assert_eq!(&a * b.clone(), a.clone() * b.clone());
    assert_eq!(&a * 3.0, a * 3.0);
}

#[test]
fn test_term_renaming_keeps_symmetry() {
    let mut map = IndexTypeMap::new();
    map.insert(IndexTypes::INACTIVE, Index::parse_set("pqrs"));
    map.insert(IndexTypes::EXTERNAL, Index::parse_set("pqrs"));
    let mut rules = PermutationRuleMap::new();
    rules.insert(("w".to_string(), 4), four_anti());
    let term = Term::parse("SUM <pqrs> w[pqrs]", &map, &rules).unwrap();
    assert_eq!(term.tensors()[0].perms().len(), 4);

    // Narrowing to single spaces keeps the pair swaps relating the mixed blocks.
    let splits = term.split_index_types();
    assert_eq!(splits.len(), 16);
    assert!(splits.iter().all(|t| t.tensors()[0].perms().len() == 4));
}

#[test]
fn test_term_simplify_delta() {
    let term = parse("SUM <j> delta[ij] t[j]").simplify_delta();
    assert_eq!(tensor_strings(&term), ["t[i]"]);
    assert!(term.ctr_indices().is_empty());

    let term = parse("delta[aa] t[a]").simplify_delta();
    assert_eq!(tensor_strings(&term), ["t[a]"]);

    let term = parse("delta[ij] delta[ji] t[ij]").simplify_delta();
    assert_eq!(tensor_strings(&term), ["delta[ij]", "t[ij]"]);

    let term = parse("SUM <pq> delta[pq] t[p] u[q]").simplify_delta();
    assert_eq!(tensor_strings(&term), ["t[q]", "u[q]"]);
    assert_eq!(term.ctr_indices(), &Index::parse_set("q"));
    assert_abs_diff_eq!(term.factor(), 1.0);

    let mut map = IndexTypeMap::new();
    map.insert(IndexTypes::INACTIVE, Index::parse_set("ip"));
    map.insert(IndexTypes::ACTIVE, Index::parse_set("p"));
    map.insert(IndexTypes::EXTERNAL, Index::parse_set("a"));
    let rules = PermutationRuleMap::new();

    // Disjoint classifications cannot be identified.
    let term = Term::parse("delta[ia] t[a]", &map, &rules)
        .unwrap()
        .simplify_delta();
    assert_abs_diff_eq!(term.factor(), 0.0);

    // The surviving index is narrowed to the common classification.
    let term = Term::parse("SUM <p> delta[ip] t[p]", &map, &rules)
        .unwrap()
        .simplify_delta();
    assert!(term.ctr_indices().is_empty());
    assert_eq!(
        term.tensors()[0].indices(),
        &[Index::new("i", IndexTypes::INACTIVE)]
    );

    let term = Term::parse("SUM <p> delta[pq] t[p]", &map, &rules)
        .unwrap()
        .simplify_delta();
    assert_eq!(term.tensors()[0].indices()[0].name(), "q");
    assert_eq!(
        term.tensors()[0].indices()[0].types(),
        IndexTypes::INACTIVE | IndexTypes::ACTIVE
    );
}

#[test]
fn test_term_split_index_types() {
    let mut map = IndexTypeMap::new();
    map.insert(IndexTypes::INACTIVE, Index::parse_set("pqi"));
    map.insert(IndexTypes::EXTERNAL, Index::parse_set("pqa"));
    let rules = PermutationRuleMap::new();

    let term = Term::parse("SUM <p> t[p] C[p]", &map, &rules).unwrap();
    let split = term.split_index_types();
    assert_eq!(split.len(), 2);
    assert_eq!(
        split[0].tensors()[0].indices()[0].types(),
        IndexTypes::INACTIVE
    );
    assert_eq!(
        split[0].tensors()[1].indices()[0].types(),
        IndexTypes::INACTIVE
    );
    assert_eq!(
        split[1].tensors()[0].indices()[0].types(),
        IndexTypes::EXTERNAL
    );
    assert_eq!(
        split[1].ctr_indices(),
        &[Index::new("p", IndexTypes::EXTERNAL)]
            .into_iter()
            .collect::<BTreeSet<_>>()
    );

    let term = Term::parse("SUM <pq> v[pq] C[i]", &map, &rules).unwrap();
    let split = term.split_index_types();
    let types = split
        .iter()
        .map(|t| {
            (
                t.tensors()[0].indices()[0].types(),
                t.tensors()[0].indices()[1].types(),
            )
        })
        .collect::<Vec<_>>();
    assert_eq!(
        types,
        [
            (IndexTypes::INACTIVE, IndexTypes::INACTIVE),
            (IndexTypes::EXTERNAL, IndexTypes::INACTIVE),
            (IndexTypes::INACTIVE, IndexTypes::EXTERNAL),
            (IndexTypes::EXTERNAL, IndexTypes::EXTERNAL),
        ]
    );

    // Single-space dummies are left alone.
    let term = Term::parse("SUM <i> t[i]", &map, &rules).unwrap();
    assert_eq!(term.split_index_types(), vec![term]);
}

#[test]
fn test_term_substitute() {
    let map = IndexTypeMap::new();
    let rules = PermutationRuleMap::new();
    let mut defs = TermDefinitions::new();
    defs.insert(
        "T".to_string(),
        (
            Tensor::parse("T[pq]", &map, &rules).unwrap(),
            vec![parse("SUM <r> x[pr] y[rq]")],
        ),
    );
    defs.insert(
        "S".to_string(),
        (
            Tensor::parse("S[pq]", &map, &rules).unwrap(),
            vec![parse("x[pq]"), parse("-0.5 y[qp]")],
        ),
    );

    let subst = parse("SUM <r> T[ar] z[r]").substitute(&defs);
    assert_eq!(subst.len(), 1);
    assert_eq!(tensor_strings(&subst[0]), ["x[as]", "y[sr]", "z[r]"]);
    assert_eq!(subst[0].ctr_indices(), &Index::parse_set("rs"));

    let subst = parse("2.0 S[ab] T[bc]").substitute(&defs);
    assert_eq!(subst.len(), 2);
    assert_eq!(tensor_strings(&subst[0]), ["x[ab]", "x[br]", "y[rc]"]);
    assert_eq!(tensor_strings(&subst[1]), ["y[ba]", "x[br]", "y[rc]"]);
    assert_abs_diff_eq!(subst[0].factor(), 2.0);
    assert_abs_diff_eq!(subst[1].factor(), -1.0);

    let untouched = parse("u[ab]");
    assert_eq!(untouched.substitute(&defs), vec![untouched]);
}

#[test]
fn test_term_predicates() {
    let mut map = IndexTypeMap::new();
    map.insert(IndexTypes::INACTIVE, Index::parse_set("ij"));
    map.insert(IndexTypes::EXTERNAL, Index::parse_set("ab"));
    let mut rules = PermutationRuleMap::new();
    rules.insert(("v".to_string(), 4), four_anti());

    let term = Term::parse("SUM <i> t[ia] C[a] D[i]", &map, &rules).unwrap();
    assert!(term.has_external_ops());
    assert!(!Term::parse("SUM <a> t[ia] C[i] D[j]", &map, &rules)
        .unwrap()
        .has_external_ops());
    assert_eq!(term.used_indices(), Index::parse_set_with_types("ia", &map));
    assert!(term.abs_equal_to(&(&term * -3.0)));
    assert!(!term.abs_equal_to(&Term::parse("t[ia] C[a] D[i]", &map, &rules).unwrap()));

    let small = parse("t[ab]");
    let large = parse("v[abcd]");
    assert!(small.group_less(&large));
    assert!(!large.group_less(&small));
    assert!(parse("t[ab] u[c]").group_less(&parse("SUM <a> t[ab] u[a]")));
    assert!(!small.group_less(&small));
}

#[test]
fn test_term_conjugate() {
    let term = parse("SUM <ab> t[ab] C[a] D[b]");
    let conj = term.conjugate();
    assert_eq!(tensor_strings(&conj), ["t[ab]", "C[b]", "D[a]"]);
    assert_eq!(conj.conjugate(), term);

    let term = parse("E1[a,b] t[ab] E2[ij,kl]");
    let conj = term.conjugate();
    assert_eq!(tensor_strings(&conj), ["E2[kl,ij]", "t[ab]", "E1[b,a]"]);
    assert!(conj
        .tensors()
        .iter()
        .all(|t| t.kind() != TensorKind::CreationOperator));
}
