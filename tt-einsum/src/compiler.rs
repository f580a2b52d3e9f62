//! Configuration of evaluation and fusion

use crate::{
    backend::{Contract, Naive},
    error::Result,
    eval,
    label::{LabelPool, Namespace},
    path::Optimize,
    tt::TensorTrain,
    tt_einsum::TtEinsum,
};
use ndarray::{ArrayD, LinalgScalar};

/// Backend, label pool, and summation order hint used to evaluate tt-einsum
///
/// ```
/// use tt_einsum::{Alphabet, Compiler, Optimize};
///
/// // reference backend and unbounded label pool
/// let compiler = Compiler::new();
///
/// // fail fusion when more than 26 labels are required
/// let compiler = Compiler::new()
///     .with_pool(Alphabet::lowercase())
///     .with_optimize(Optimize::Alphabetical);
/// ```
#[derive(Debug, Clone)]
pub struct Compiler<B = Naive, P = Namespace> {
    backend: B,
    pool: P,
    optimize: Optimize,
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler {
            backend: Naive,
            pool: Namespace,
            optimize: Optimize::default(),
        }
    }
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B, P> Compiler<B, P> {
    pub fn with_backend<B2>(self, backend: B2) -> Compiler<B2, P> {
        Compiler {
            backend,
            pool: self.pool,
            optimize: self.optimize,
        }
    }

    pub fn with_pool<P2: LabelPool>(self, pool: P2) -> Compiler<B, P2> {
        Compiler {
            backend: self.backend,
            pool,
            optimize: self.optimize,
        }
    }

    pub fn with_optimize(self, optimize: Optimize) -> Self {
        Compiler { optimize, ..self }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn pool(&self) -> &P {
        &self.pool
    }

    pub fn optimize(&self) -> &Optimize {
        &self.optimize
    }

    /// See [eval::independent]
    pub fn independent<T>(
        &self,
        einsum: &TtEinsum,
        operands: &[&TensorTrain<T>],
    ) -> Result<TensorTrain<T>>
    where
        T: LinalgScalar,
        B: Contract<T>,
    {
        eval::independent(&self.backend, &self.optimize, einsum, operands)
    }

    /// See [eval::running]
    pub fn running<T>(
        &self,
        einsum: &TtEinsum,
        operands: &[&TensorTrain<T>],
    ) -> Result<Vec<ArrayD<T>>>
    where
        T: LinalgScalar,
        B: Contract<T>,
    {
        eval::running(&self.backend, &self.optimize, einsum, operands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{label::Alphabet, node::Node, testing::*};
    use ndarray::ArrayViewD;

    /// [Naive] summing up indices in reverse alphabetical order
    struct Reversed;

    impl Contract<f64> for Reversed {
        fn contract(
            &self,
            subscripts: &str,
            operands: &[ArrayViewD<'_, f64>],
            _optimize: &Optimize,
        ) -> Result<ArrayD<f64>> {
            let parsed: crate::subscripts::Subscripts = subscripts.parse()?;
            let mut order: Vec<char> = parsed.summation_indices().into_iter().collect();
            order.reverse();
            Naive.contract(subscripts, operands, &Optimize::Manual(order))
        }
    }

    #[test]
    fn custom_backend() {
        let einsum: TtEinsum = "running: a i b, c i d, a c -> b d".parse().unwrap();
        let a = chain(&[[1, 2, 2], [2, 3, 1]], 0.2);
        let b = chain(&[[1, 2, 2], [2, 3, 1]], 0.9);
        let expected = Compiler::new().running(&einsum, &[&a, &b]).unwrap();
        let reversed = Compiler::new().with_backend(Reversed);
        let results = reversed.running(&einsum, &[&a, &b]).unwrap();
        assert_eq!(results.len(), expected.len());
        for (result, expected) in results.iter().zip(&expected) {
            assert_close(result, expected);
        }
    }

    #[test]
    fn manual_order_on_fused() {
        let x = Node::from(chain(&[[1, 2, 2], [2, 3, 1]], 0.2));
        let y = Node::from(chain(&[[1, 2, 3], [3, 3, 1]], 0.9));
        let expected = x.multiply(&y).unwrap().flat_inner(&y, &Compiler::new()).unwrap();

        // labels of the fused tt-einsum differ from `a i b, c i d`
        let compiler = Compiler::new()
            .with_pool(Alphabet::lowercase())
            .with_optimize(Optimize::Manual(vec!['a', 'c', 'i']));
        let inner = x.multiply(&y).unwrap().flat_inner(&y, &compiler).unwrap();
        assert_close(&inner, &expected);

        let compiler = compiler.with_optimize(Optimize::Manual(vec!['h', 'f', 'e']));
        let inner = x.multiply(&y).unwrap().flat_inner(&y, &compiler).unwrap();
        assert_close(&inner, &expected);
    }
}
