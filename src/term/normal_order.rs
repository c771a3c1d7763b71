//! Wick contraction of operator strings into normal order.

use std::cmp::{max, min};

use crate::index::IndexTypes;
use crate::tensor::{Tensor, TensorKind};

use super::Term;

#[cfg(test)]
#[path = "normal_order_tests.rs"]
mod normal_order_tests;

/// Parity of reversing a sequence of `k` operators.
fn reversal_parity(k: usize) -> bool {
    (k * k.saturating_sub(1) / 2) % 2 == 1
}

/// Parity of the number of inversions in `seq`.
fn inversion_parity(seq: &[usize]) -> bool {
    seq.iter()
        .enumerate()
        .filter(|&(i, &x)| seq[i + 1..].iter().filter(|&&y| y < x).count() % 2 == 1)
        .count()
        % 2
        == 1
}

/// Stable insertion argsort under a strict "stands before" relation. The relation need not be
/// transitive.
fn insertion_argsort<F>(n: usize, before: F) -> Vec<usize>
where
    F: Fn(usize, usize) -> bool,
{
    let mut order = Vec::<usize>::with_capacity(n);
    for i in 0..n {
        let mut pos = order.len();
        while pos > 0 && before(i, order[pos - 1]) {
            pos -= 1;
        }
        order.insert(pos, i);
    }
    order
}

impl Term {
    /// Applies Wick's theorem to the operators of this term.
    ///
    /// Every admissible set of pairwise contractions is enumerated depth-first with an explicit
    /// stack. Each contraction is replaced by a Kronecker delta and the remaining operators are
    /// written in normal order. The fermionic sign of a branch is accumulated from the parity of
    /// each contracted pair, its crossings with the pairs fixed before it, and the displacement
    /// of the contracted operators relative to the normal-ordered target.
    ///
    /// Spin-free operators are first expanded into creation and annihilation halves. In that
    /// case operators on inactive indices must all be contracted: branches that can no longer
    /// achieve this are pruned, and every closed inactive loop contributes a spin-sum factor of
    /// two.
    ///
    /// # Arguments
    ///
    /// * `max_unctr` - If given, branches leaving more than this number of uncontracted
    /// operators are dropped.
    /// * `no_ctr` - If `true`, no contraction is performed and only the reordered term is
    /// produced.
    ///
    /// # Returns
    ///
    /// The terms of the normal-ordered expansion.
    ///
    /// # Panics
    ///
    /// Panics if the term mixes elementary and spin-free operators.
    pub fn normal_order(&self, max_unctr: Option<usize>, no_ctr: bool) -> Vec<Term> {
        let elementary = self.tensors.iter().any(|t| {
            matches!(
                t.kind(),
                TensorKind::CreationOperator | TensorKind::DestroyOperator
            )
        });
        let spin_free = self
            .tensors
            .iter()
            .any(|t| t.kind() == TensorKind::SpinFreeOperator);
        assert!(
            !(elementary && spin_free),
            "Elementary and spin-free operators cannot be normal-ordered in the same term: {self}"
        );

        // Elementary operators, the partner of every spin-free half, and everything else.
        let mut ops = Vec::<Tensor>::with_capacity(self.tensors.len());
        let mut partner = Vec::<usize>::new();
        let mut others = Vec::<Tensor>::with_capacity(self.tensors.len());
        let mut init_sign = false;
        for tensor in self.tensors.iter() {
            match tensor.kind() {
                TensorKind::CreationOperator | TensorKind::DestroyOperator => {
                    ops.push(tensor.clone())
                }
                TensorKind::SpinFreeOperator => {
                    let k = tensor.arity() / 2;
                    init_sign ^= reversal_parity(k);
                    let base = ops.len();
                    for i in 0..k {
                        ops.push(Tensor::cre(tensor.indices()[i].clone()));
                        partner.push(base + k + i);
                    }
                    for i in 0..k {
                        ops.push(Tensor::des(tensor.indices()[k + i].clone()));
                        partner.push(base + i);
                    }
                }
                _ => others.push(tensor.clone()),
            }
        }
        let n = ops.len();
        let is_inactive =
            |t: &Tensor| t.indices()[0].types().intersects(IndexTypes::INACTIVE);

        // Admissible pairs, grouped by their first operator.
        let mut pairs = Vec::<(usize, usize)>::new();
        let mut pair_start = vec![0; n + 1];
        let mut n_inactive = vec![0usize; n + 1];
        for i in 0..n {
            pair_start[i] = pairs.len();
            for j in i + 1..n {
                if spin_free {
                    let (ti, tj) = (is_inactive(&ops[i]), is_inactive(&ops[j]));
                    if ti || tj {
                        if ops[i].kind() < ops[j].kind() && ti && tj {
                            pairs.push((i, j));
                            n_inactive[i] = 1;
                        }
                    } else if ops[j].kind() < ops[i].kind() {
                        pairs.push((i, j));
                    }
                } else if ops[i].kind() != ops[j].kind() && ops[j].normal_order_lt(&ops[i]) {
                    pairs.push((i, j));
                }
            }
        }
        pair_start[n] = pairs.len();
        for i in (0..n).rev() {
            n_inactive[i] += n_inactive[i + 1];
        }
        let inactive_flag = |a: usize| n_inactive[a] - n_inactive[a + 1];

        let mut stack = Vec::<(usize, Option<usize>)>::new();
        let mut acc = vec![false; n / 2 + 3];
        let mut order = (0..n).collect::<Vec<_>>();
        let mut rank = vec![0; n];
        if max_unctr != Some(0) || n % 2 == 0 {
            stack.push((0, None));
            acc[0] = init_sign;
            if spin_free {
                order.sort_by_key(|&i| ops[i].kind());
            } else {
                order = insertion_argsort(n, |i, j| ops[i].normal_order_lt(&ops[j]));
                for (pos, &i) in order.iter().enumerate() {
                    rank[i] = pos;
                }
                acc[0] ^= inversion_parity(&rank);
            }
        }

        let mut cur = vec![(0usize, 0usize); n / 2 + 2];
        let mut mask = vec![false; n];
        let mut inactive_mask = vec![false; n];
        let mut partner_now = partner.clone();
        let mut terms = vec![];
        while let Some((depth, pair)) = stack.pop() {
            let mut next = 0;
            let mut n_inact = 0;
            let mut inact_fac = 1.0;
            if let Some(p) = pair {
                cur[depth - 1] = pairs[p];
                next = pair_start[pairs[p].0 + 1];
            }
            acc[depth + 1] = acc[depth];
            mask.fill(false);
            if spin_free {
                partner_now.copy_from_slice(&partner);
                inactive_mask.fill(false);
            }
            if depth > 0 {
                let (c, d) = cur[depth - 1];
                let mut sign = acc[depth + 1] ^ ((c ^ d) & 1 == 0);
                let mut overlaps = false;
                for &(a, b) in cur[..depth - 1].iter() {
                    if b == d || b == c || a == d {
                        overlaps = true;
                        break;
                    }
                    mask[a] = true;
                    mask[b] = true;
                    sign ^= (a < c && b > c && b < d) || (a > c && a < d && b > d);
                }
                if overlaps {
                    continue;
                }
                mask[c] = true;
                mask[d] = true;

                if spin_free {
                    let close = |x: usize,
                                     y: usize,
                                     partner_now: &mut [usize],
                                     inactive_mask: &mut [bool]| {
                        inactive_mask[x] |= inactive_flag(x) > 0;
                        inactive_mask[y] |= inactive_flag(y) > 0;
                        let px = partner_now[x];
                        inactive_mask[px] |= inactive_mask[x];
                        let py = partner_now[y];
                        inactive_mask[py] |= inactive_mask[y];
                        inactive_flag(x)
                    };
                    let merge = |x: usize, y: usize, partner_now: &mut [usize]| {
                        let px = partner_now[x];
                        partner_now[px] = partner_now[y];
                        let py = partner_now[y];
                        partner_now[py] = partner_now[x];
                    };
                    for &(a, b) in cur[..depth - 1].iter() {
                        n_inact += close(a, b, &mut partner_now, &mut inactive_mask);
                        if partner_now[a] == b && inactive_mask[a] {
                            inact_fac *= 2.0;
                        }
                        merge(a, b, &mut partner_now);
                    }
                    n_inact += close(c, d, &mut partner_now, &mut inactive_mask);
                    // Every inactive operator must end up contracted.
                    if n_inact + n_inactive[c + 1] < n_inactive[0] {
                        continue;
                    }
                    if partner_now[c] == d && inactive_mask[c] {
                        inact_fac *= 2.0;
                    }
                    merge(c, d, &mut partner_now);
                } else {
                    sign ^= rank[d] < rank[c];
                    for i in (0..n).filter(|&i| !mask[i]) {
                        sign ^= rank[max(c, i)] < rank[min(c, i)];
                        sign ^= rank[max(d, i)] < rank[min(d, i)];
                    }
                }
                acc[depth + 1] = sign;
            }

            if !no_ctr {
                stack.extend((next..pairs.len()).map(|k| (depth + 1, Some(k))));
            }
            if max_unctr.map_or(false, |m| n - 2 * depth > m) {
                continue;
            }

            let mut tensors = others.clone();
            tensors.extend(cur[..depth].iter().map(|&(a, b)| {
                Tensor::kronecker_delta(ops[a].indices()[0].clone(), ops[b].indices()[0].clone())
            }));
            let mut final_sign = false;
            if spin_free {
                if n_inact < n_inactive[0] {
                    continue;
                }
                let tn = n / 2 - depth;
                let mut slots = vec![0; 2 * tn];
                for (k, &i) in order
                    .iter()
                    .filter(|&&i| !mask[i] && ops[i].kind() == TensorKind::CreationOperator)
                    .enumerate()
                {
                    slots[k] = i;
                    slots[k + tn] = partner_now[i];
                }
                final_sign = reversal_parity(tn) ^ inversion_parity(&slots);
                if tn > 0 {
                    tensors.push(Tensor::spin_free(
                        slots
                            .iter()
                            .map(|&i| ops[i].indices()[0].clone())
                            .collect(),
                    ));
                }
            } else {
                tensors.extend(order.iter().filter(|&&i| !mask[i]).map(|&i| ops[i].clone()));
            }
            let factor = if acc[depth + 1] ^ final_sign {
                -self.factor
            } else {
                self.factor
            };
            terms.push(Term::new(
                tensors,
                self.ctr_indices.clone(),
                inact_fac * factor,
            ));
        }
        terms
    }
}
