//! Proptest strategies for TT chains

use ndarray::{ArrayD, IxDyn};
use proptest::collection::vec;
use proptest::prelude::*;
use tt_einsum::TensorTrain;

/// Mode dimensions of a chain of one to four cores
pub fn arb_modes() -> impl Strategy<Value = Vec<usize>> {
    vec(1usize..=3, 1..=4)
}

/// Chain of the given modes, with TT-ranks up to 3 and elements in `[-1, 1)`
pub fn arb_chain(modes: Vec<usize>) -> impl Strategy<Value = TensorTrain<f64>> {
    let d = modes.len();
    vec(1usize..=3, d - 1).prop_flat_map(move |inner| {
        let mut ranks = vec![1];
        ranks.extend(inner);
        ranks.push(1);
        let cores: Vec<_> = (0..d)
            .map(|k| {
                let shape = [ranks[k], modes[k], ranks[k + 1]];
                vec(-1.0f64..1.0, shape.iter().product::<usize>()).prop_map(move |data| {
                    ArrayD::from_shape_vec(IxDyn(&shape), data).expect("size matches")
                })
            })
            .collect();
        cores.prop_map(|cores| TensorTrain::new(cores).expect("valid ranks"))
    })
}

/// `n` chains sharing the same modes
pub fn arb_operands(n: usize) -> impl Strategy<Value = Vec<TensorTrain<f64>>> {
    arb_modes().prop_flat_map(move |modes| {
        (0..n)
            .map(|_| arb_chain(modes.clone()))
            .collect::<Vec<_>>()
    })
}
