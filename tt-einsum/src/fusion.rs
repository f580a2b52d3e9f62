//! Inline producers of operands into the consumer tt-einsum
//!
//! Consider the inner product of the elementwise product `a * b` and `c`.
//! `a * b` is the independent tt-einsum
//!
//! ```text
//! independent: a i b, c i d -> ac i bd
//! ```
//!
//! whose result has the composite TT-rank `ac`,
//! and the inner product is the running tt-einsum
//!
//! ```text
//! running: a i b, c i d, a c -> b d
//! ```
//!
//! Instead of evaluating `a * b` into a chain, the producer is inlined into the first
//! argument of the consumer. The labels of the producer are renamed into vacant ones,
//! and each label of the consumer's argument is threaded into the corresponding
//! group of the producer's result, e.g. `a -> eh`:
//!
//! ```text
//! running: e f g, h f j, c f d, eh c -> gj d
//! ```
//!
//! This is evaluated against the three leaves at once.

use crate::{
    error::{Error, Result},
    label::{LabelPool, Mapping},
    node::Node,
    tt::TensorTrain,
    tt_einsum::{EinsumKind, TtEinsum},
};
use std::{collections::VecDeque, sync::Arc};

/// Inline the producer `inner` into the `k`-th argument of `outer`
pub fn inline<P>(outer: &TtEinsum, k: usize, inner: &TtEinsum, pool: &P) -> Result<TtEinsum>
where
    P: LabelPool + ?Sized,
{
    if inner.kind() != EinsumKind::Independent {
        return Err(Error::UnsupportedEinsumKind(format!(
            "only independent tt-einsum can be inlined: `{}`",
            inner
        )));
    }
    if k >= outer.num_operands() {
        return Err(Error::ShapeMismatch(format!(
            "`{}` has no operand {}",
            outer, k
        )));
    }

    let inner_labels = inner.flat_labels();
    let vacant = pool.vacant(&outer.labels(), inner_labels.len())?;
    let inner = inner.relabel(&Mapping::injective(&inner_labels, &vacant));

    let target = &outer.args()[k];
    let incompatible = || Error::IncompatibleFusionShape {
        target: target.to_string(),
        producer: inner.res().to_string(),
    };
    if target.groups().len() != inner.res().groups().len() {
        return Err(incompatible());
    }
    let mut threading = Mapping::new();
    // a label appearing twice in the target must be threaded into the same group
    let mut thread = |from: char, to: &[char]| {
        if let Some(current) = threading.get(from) {
            if current != to {
                return Err(incompatible());
            }
        }
        threading.insert(from, to);
        Ok(())
    };
    for (t, p) in target.groups().iter().zip(inner.res().groups()) {
        if t.len() == 1 {
            thread(t.labels()[0], p.labels())?;
        } else if t.len() == p.len() {
            for (from, to) in t.labels().iter().zip(p.labels()) {
                thread(*from, &[*to])?;
            }
        } else {
            return Err(incompatible());
        }
    }

    let mut args = Vec::with_capacity(outer.args().len() + inner.args().len() - 1);
    for (n, arg) in outer.args().iter().enumerate() {
        if n == k {
            args.extend(inner.args().iter().cloned());
        } else {
            args.push(arg.relabel(&threading));
        }
    }
    let fused = TtEinsum::new(outer.kind(), args, outer.res().relabel(&threading))?;
    log::debug!("inline `{}` into operand {} of `{}`: `{}`", inner, k, outer, fused);
    Ok(fused)
}

/// Fuse all producers of `operands` into `outer`
///
/// Returns the fused tt-einsum and the leaves it is evaluated against.
/// Operands are scanned from left to right; when a producer is inlined,
/// its own operands take its place and are scanned next,
/// so producers of producers are inlined as well.
pub fn fuse_operands<T, P>(
    outer: &TtEinsum,
    operands: &[Node<T>],
    pool: &P,
) -> Result<(TtEinsum, Vec<Arc<TensorTrain<T>>>)>
where
    P: LabelPool + ?Sized,
{
    if operands.len() != outer.num_operands() {
        return Err(Error::ShapeMismatch(format!(
            "`{}` takes {} operands, got {}",
            outer,
            outer.num_operands(),
            operands.len()
        )));
    }
    let mut einsum = outer.clone();
    let mut leaves = Vec::with_capacity(operands.len());
    let mut pending: VecDeque<Node<T>> = operands.iter().cloned().collect();
    while let Some(node) = pending.pop_front() {
        match node {
            Node::Leaf(tt) => leaves.push(tt),
            Node::Derived(derivation) => {
                // every operand before the current one is a leaf
                einsum = inline(&einsum, leaves.len(), derivation.einsum(), pool)?;
                for operand in derivation.operands().iter().rev() {
                    pending.push_front(operand.clone());
                }
            }
        }
    }
    Ok((einsum, leaves))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{label::Alphabet, label::Namespace, node::Derivation, testing::*};
    use std::collections::BTreeSet;

    fn multiply() -> TtEinsum {
        "independent: a i b, c i d -> ac i bd".parse().unwrap()
    }

    fn flat_inner() -> TtEinsum {
        "running: a i b, c i d, a c -> b d".parse().unwrap()
    }

    fn derived(einsum: TtEinsum, operands: Vec<Node<f64>>) -> Node<f64> {
        Node::Derived(Arc::new(Derivation::new(einsum, operands).unwrap()))
    }

    #[test]
    fn inline_multiply_into_inner() {
        let fused = inline(&flat_inner(), 0, &multiply(), &Namespace).unwrap();
        insta::assert_display_snapshot!(fused, @"running: e f g, h f j, c f d, eh c -> gj d");
    }

    #[test]
    fn inline_into_second_operand() {
        let fused = inline(&multiply(), 1, &multiply(), &Namespace).unwrap();
        insta::assert_display_snapshot!(fused, @"independent: a f b, e f g, h f j -> aeh f bgj");
    }

    #[test]
    fn collision_free() {
        let outer = flat_inner();
        let fused = inline(&outer, 0, &multiply(), &Alphabet::lowercase()).unwrap();
        let outer_labels = outer.labels();
        // labels of the inlined arguments are all vacant in the consumer
        let inlined: BTreeSet<char> = fused.args()[..2].iter().flat_map(|arg| arg.flat()).collect();
        assert!(inlined.is_disjoint(&outer_labels));
    }

    #[test]
    fn two_producers_do_not_collide() {
        let a = Node::from(chain(&[[1, 2, 2], [2, 2, 1]], 0.1));
        let ab = derived(multiply(), vec![a.clone(), a.clone()]);
        let (fused, leaves) = fuse_operands(&flat_inner(), &[ab.clone(), ab], &Namespace).unwrap();
        assert_eq!(leaves.len(), 4);
        assert_eq!(fused.num_operands(), 4);
        let first: BTreeSet<char> = fused.args()[..2].iter().flat_map(|arg| arg.flat()).collect();
        let second: BTreeSet<char> = fused.args()[2..4].iter().flat_map(|arg| arg.flat()).collect();
        // mode label is shared, rank labels are not
        assert_eq!(first.intersection(&second).count(), 1);
    }

    #[test]
    fn nested_producers() {
        let a = Node::from(chain(&[[1, 2, 2], [2, 2, 1]], 0.1));
        let ab = derived(multiply(), vec![a.clone(), a.clone()]);
        let abc = derived(multiply(), vec![ab, a.clone()]);
        let (fused, leaves) = fuse_operands(&flat_inner(), &[abc, a], &Namespace).unwrap();
        assert_eq!(leaves.len(), 4);
        assert_eq!(fused.kind(), EinsumKind::Running);
        assert_eq!(fused.args().len(), 5);
        assert_eq!(fused.accumulator().unwrap().flat().len(), 4);
    }

    #[test]
    fn alphabet_exhausted() {
        // five labels are used, only two remain
        let pool = Alphabet::new("abcdixy".chars()).unwrap();
        assert!(matches!(
            inline(&flat_inner(), 0, &multiply(), &pool),
            Err(Error::AlphabetExhausted {
                required: 5,
                available: 2
            })
        ));
    }

    #[test]
    fn incompatible_group_length() {
        // consumer splits the rank into two labels, producer has three
        let outer: TtEinsum = "independent: ab i c, d i e -> abd i ce".parse().unwrap();
        let inner: TtEinsum = "independent: a i b, c i d, e i f -> ace i bdf"
            .parse()
            .unwrap();
        assert!(matches!(
            inline(&outer, 0, &inner, &Namespace),
            Err(Error::IncompatibleFusionShape { .. })
        ));
    }

    #[test]
    fn incompatible_group_count() {
        let matmul: TtEinsum = "independent: a i j b, c j k d -> ac i k bd".parse().unwrap();
        assert!(matches!(
            inline(&flat_inner(), 0, &matmul, &Namespace),
            Err(Error::IncompatibleFusionShape { .. })
        ));
    }

    #[test]
    fn running_producer() {
        assert!(matches!(
            inline(&flat_inner(), 0, &flat_inner(), &Namespace),
            Err(Error::UnsupportedEinsumKind(_))
        ));
    }

    #[test]
    fn arity() {
        let a = Node::from(chain(&[[1, 2, 1]], 0.1));
        assert!(matches!(
            fuse_operands(&flat_inner(), &[a], &Namespace),
            Err(Error::ShapeMismatch(_))
        ));
    }
}
