use approx::assert_abs_diff_eq;
use rayon::ThreadPoolBuilder;

use crate::expression::{Definitions, Expr};
use crate::index::{Index, IndexTypeMap, IndexTypes};
use crate::permutation::four_anti;
use crate::tensor::{PermutationRuleMap, TensorKind};
use crate::term::Term;

fn rules() -> PermutationRuleMap {
    let mut rules = PermutationRuleMap::new();
    rules.insert(("w".to_string(), 4), four_anti());
    rules
}

fn type_map() -> IndexTypeMap {
    let mut map = IndexTypeMap::new();
    map.insert(IndexTypes::INACTIVE, Index::parse_set("ijklpq"));
    map.insert(IndexTypes::EXTERNAL, Index::parse_set("abcdpq"));
    map
}

fn parse(text: &str) -> Expr {
    Expr::parse(text, &IndexTypeMap::new(), &rules()).unwrap()
}

fn parse_typed(text: &str) -> Expr {
    Expr::parse(text, &type_map(), &rules()).unwrap()
}

fn factors(expr: &Expr) -> Vec<f64> {
    expr.terms().iter().map(Term::factor).collect()
}

#[test]
fn test_expr_parse() {
    let expr = parse("h[pq]\n\n - 0.5 SUM <r> v[pr] u[rq]\r\n");
    assert_eq!(expr.len(), 2);
    assert_eq!(factors(&expr), [1.0, -0.5]);
    assert!(expr.to_string().starts_with("EXPR /2/\n"));
    assert_eq!(expr.to_string().lines().count(), 3);

    assert!(parse("").is_empty());
    assert_eq!(Expr::default().to_string(), "EXPR /0/");
    assert!(Expr::parse("h[pq]\n 1.2.3 t[p]", &IndexTypeMap::new(), &rules()).is_err());
}

#[test]
fn test_expr_parse_def() {
    let (tensor, expr) = Expr::parse_def(
        "E1T[a,b] = 2.0 delta[ab]\n - E1[b,a]",
        &IndexTypeMap::new(),
        &rules(),
    )
    .unwrap();
    assert_eq!(tensor.name(), "E1T");
    assert_eq!(tensor.arity(), 2);
    assert_eq!(expr.len(), 2);
    assert_eq!(factors(&expr), [2.0, -1.0]);

    assert!(Expr::parse_def("E1T[a,b] 2.0 delta[ab]", &IndexTypeMap::new(), &rules()).is_err());
}

#[test]
fn test_expr_arithmetic() {
    let a = parse("t[p]\n 2.0 u[p]");
    let b = parse("x[q]\n -1.0 y[q]");

    let sum = &a + &b;
    assert_eq!(factors(&sum), [1.0, 2.0, 1.0, -1.0]);
    let diff = &a - &b;
    assert_eq!(factors(&diff), [1.0, 2.0, -1.0, 1.0]);
    assert_eq!(factors(&(-&a)), [-1.0, -2.0]);
    assert_eq!(factors(&(0.5 * &a)), [0.5, 1.0]);
    assert_eq!(&a * 0.5, 0.5 * a.clone());

    let product = &a * &b;
    assert_eq!(product.len(), 4);
    assert_eq!(factors(&product), [1.0, -1.0, 2.0, -2.0]);
    assert_eq!(product.terms()[3].to_string(), "(   -2.0000000000) u[p] y[q]");

    let pair = Term::parse("t[p]", &IndexTypeMap::new(), &rules()).unwrap()
        + Term::parse("u[p]", &IndexTypeMap::new(), &rules()).unwrap();
    assert_eq!(pair, parse("t[p]\n u[p]"));
    assert_eq!(
        Expr::from(Term::parse("t[p]", &IndexTypeMap::new(), &rules()).unwrap()),
        parse("t[p]")
    );
}

#[test]
fn test_expr_commutator_and_contraction() {
    let a = parse("C[p]");
    let b = parse("D[q]");
    let commutator = &a ^ &b;
    assert_eq!(commutator.len(), 2);
    assert_eq!(commutator.terms()[0].to_string(), "(    1.0000000000) C[p] D[q]");
    assert_eq!(commutator.terms()[1].to_string(), "(   -1.0000000000) D[q] C[p]");

    let full = parse("t[pq]") & parse("u[q]");
    assert_eq!(full.len(), 1);
    assert_eq!(full.terms()[0].ctr_indices(), &Index::parse_set("pq"));
}

#[test]
fn test_expr_simplify_merge_cancellation() {
    let expr = parse("C[i] D[j]\n -1.0 C[i] D[j]");
    assert!(expr.simplify().is_empty());

    let expr = parse("w[pqrs]\n w[qprs]");
    assert!(expr.simplify().is_empty());

    let expr = parse("w[pqrs]\n -1.0 w[qprs]");
    let simplified = expr.simplify();
    assert_eq!(simplified.len(), 1);
    assert_abs_diff_eq!(simplified.terms()[0].factor(), 2.0);
}

#[test]
fn test_expr_simplify_merge_renamed_dummies() {
    let expr = parse("SUM <k> t[ka] u[kb]\n SUM <l> t[la] u[lb]");
    let simplified = expr.simplify();
    assert_eq!(simplified.len(), 1);
    assert_abs_diff_eq!(simplified.terms()[0].factor(), 2.0);
    assert_eq!(
        simplified.terms()[0].to_string(),
        "(    2.0000000000) SUM <k> t[ka] u[kb]"
    );

    // Terms with different free indices stay apart.
    let expr = parse("SUM <k> t[ka] u[kb]\n SUM <k> t[kb] u[ka]");
    assert_eq!(expr.simplify().len(), 2);
}

#[test]
fn test_expr_simplify_delta_and_zero() {
    let expr = parse_typed("SUM <a> delta[aa] t[a]\n delta[ia] t[i]\n 0.00000000000001 t[j]\n 3.0");
    let simplified = expr.simplify();
    assert_eq!(simplified.len(), 1);
    assert_eq!(simplified.terms()[0].tensors()[0].to_string(), "t[a]");
}

#[test]
fn test_expr_expand() {
    let expanded = parse("D[i] C[j]").expand(None, false);
    assert_eq!(expanded.len(), 2);
    assert_eq!(factors(&expanded), [-1.0, 1.0]);
    assert_eq!(parse("D[i] C[j]").expand(Some(0), false).len(), 1);

    // `p` ranges over two spaces and is split before normal ordering.
    let expanded = parse_typed("SUM <p> h[pp]").expand(None, false);
    assert_eq!(expanded.len(), 2);
    let spaces = expanded
        .terms()
        .iter()
        .map(|t| t.ctr_indices().iter().next().unwrap().types())
        .collect::<Vec<_>>();
    assert_eq!(spaces, [IndexTypes::INACTIVE, IndexTypes::EXTERNAL]);
}

#[test]
fn test_expr_thread_count_independence() {
    let expr = parse_typed(
        "0.25 SUM <pqrs> w[pqrs] C[p] C[q] D[s] D[r]\n SUM <pq> h[pq] C[p] D[q]\n D[i] D[j] C[a] C[b]",
    );
    let single = ThreadPoolBuilder::new().num_threads(1).build().unwrap();
    let multi = ThreadPoolBuilder::new().num_threads(4).build().unwrap();
    let x = expr.expand_in(&single, None, false);
    let y = expr.expand_in(&multi, None, false);
    assert_eq!(x, y);
    assert_eq!(x.simplify_in(&single), y.simplify_in(&multi));
}

#[test]
fn test_expr_remove_external() {
    let expr = parse_typed("C[a] D[i]\n C[i] D[j]\n t[ab]");
    let kept = expr.remove_external();
    assert_eq!(kept.len(), 2);
    assert_eq!(kept.terms()[0].tensors()[0].to_string(), "C[i]");
}

#[test]
fn test_expr_add_spin_free_trans_symm() {
    let expr = parse("E2[ab,cd] t[abcd]\n E1[a,b] E1[c,d]");
    assert_eq!(expr.terms()[0].tensors()[0].perms().len(), 2);
    let symm = expr.add_spin_free_trans_symm();
    assert_eq!(symm.terms()[0].tensors()[0].perms().len(), 4);
    assert_eq!(symm.terms()[0].tensors()[1].perms().len(), 1);
    assert_eq!(symm.terms()[1], expr.terms()[1]);
    assert!(symm.terms()[1]
        .tensors()
        .iter()
        .all(|t| t.kind() == TensorKind::SpinFreeOperator && t.perms().len() == 1));
}

#[test]
fn test_expr_substitute() {
    let mut defs = Definitions::new();
    let (tensor, rhs) = Expr::parse_def(
        "f[pq] = h[pq]\n - 0.5 SUM <k> w[pkqk]",
        &IndexTypeMap::new(),
        &rules(),
    )
    .unwrap();
    defs.insert(tensor.name().to_string(), (tensor, rhs));

    let substituted = parse("SUM <ab> f[ab] t[ab]\n u[c]").substitute(&defs);
    assert_eq!(substituted.len(), 3);
    assert_eq!(factors(&substituted), [1.0, -0.5, 1.0]);
    assert_eq!(
        substituted.terms()[0].to_string(),
        "(    1.0000000000) SUM <ab> h[ab] t[ab]"
    );
}

#[test]
fn test_expr_conjugate() {
    let expr = parse("2.0 t[pq] C[p] D[q]");
    let conjugated = expr.conjugate();
    assert_eq!(
        conjugated.terms()[0].to_string(),
        "(    2.0000000000) t[pq] C[q] D[p]"
    );
    assert_eq!(conjugated.conjugate(), expr);
}
