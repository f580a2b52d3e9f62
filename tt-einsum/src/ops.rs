//! Operations on TT chains
//!
//! Every operation is declared by a tt-einsum in [declared],
//! and can be used in two ways:
//!
//! - eagerly on [TensorTrain]s, e.g. [multiply] and [flat_inner],
//!   which evaluates each operation into a chain
//! - lazily on [Node]s, e.g. [Node::multiply] and [Node::flat_inner],
//!   which fuses a chain of operations and evaluates it once
//!
//! ```
//! use ndarray::{ArrayD, IxDyn};
//! use std::sync::Arc;
//! use tt_einsum::{ops, Compiler, TensorTrain};
//!
//! let core = |r: usize, n: usize, s: usize| ArrayD::<f64>::ones(IxDyn(&[r, n, s]));
//! let a = Arc::new(TensorTrain::new(vec![core(1, 2, 2), core(2, 3, 1)]).unwrap());
//! let b = Arc::new(TensorTrain::new(vec![core(1, 2, 3), core(3, 3, 1)]).unwrap());
//!
//! // a * b * a without building the intermediate of ranks [1, 6, 1]
//! let compiler = Compiler::new();
//! let aba = ops::fuse(&compiler, &[a.clone(), b.clone()], |x| {
//!     x[0].multiply(&x[1])?.multiply(&x[0])
//! })
//! .unwrap();
//! assert_eq!(aba.tt_ranks(), vec![1, 12, 1]);
//!
//! // same as the eager evaluation
//! let expected = ops::multiply(&ops::multiply(&a, &b).unwrap(), &a).unwrap();
//! assert_eq!(aba.tt_ranks(), expected.tt_ranks());
//! ```

use crate::{
    backend::Contract,
    compiler::Compiler,
    error::{Error, Result},
    fusion::fuse_operands,
    label::LabelPool,
    node::{Derivation, Node},
    tt::{ChainFormat, TensorTrain},
    tt_einsum::{EinsumKind, TtEinsum},
    vmap::vmap,
};
use ndarray::{Array2, ArrayD, IxDyn, LinalgScalar};
use std::sync::Arc;

/// Named tt-einsum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    name: String,
    einsum: TtEinsum,
}

impl Operation {
    pub fn new(name: impl Into<String>, einsum: TtEinsum) -> Self {
        Operation {
            name: name.into(),
            einsum,
        }
    }

    /// Declare an operation by tt-einsum literal
    ///
    /// ```
    /// use tt_einsum::ops::Operation;
    ///
    /// let multiply =
    ///     Operation::declare("multiply", "independent: a i b, c i d -> ac i bd").unwrap();
    /// assert_eq!(multiply.einsum().to_vanilla(), "...aib,...cid->...acibd");
    /// ```
    pub fn declare(name: &str, literal: &str) -> Result<Self> {
        let einsum: TtEinsum = literal.parse()?;
        log::debug!("declare {}: `{}`", name, einsum);
        Ok(Operation::new(name, einsum))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn einsum(&self) -> &TtEinsum {
        &self.einsum
    }

    /// Evaluate independent operation on chains
    pub fn call<T, B, P>(
        &self,
        compiler: &Compiler<B, P>,
        operands: &[&TensorTrain<T>],
    ) -> Result<TensorTrain<T>>
    where
        T: LinalgScalar,
        B: Contract<T>,
    {
        compiler.independent(&self.einsum, operands)
    }

    /// Record independent operation on nodes without evaluation
    ///
    /// Arity, chain lengths, and formats are checked here,
    /// while the mode dimensions are checked when evaluated.
    pub fn apply<T: LinalgScalar>(&self, operands: &[Node<T>]) -> Result<Node<T>> {
        let derivation = Derivation::new(self.einsum.clone(), operands.to_vec())?;
        Ok(Node::Derived(Arc::new(derivation)))
    }

    /// Fuse producers of operands into running operation and evaluate it
    ///
    /// Returns the accumulator after each core as [eval::running](crate::eval::running).
    pub fn run<T, B, P>(
        &self,
        compiler: &Compiler<B, P>,
        operands: &[Node<T>],
    ) -> Result<Vec<ArrayD<T>>>
    where
        T: LinalgScalar,
        B: Contract<T>,
        P: LabelPool,
    {
        if self.einsum.kind() != EinsumKind::Running {
            return Err(Error::UnsupportedEinsumKind(format!(
                "{} is not a running operation: `{}`",
                self.name, self.einsum
            )));
        }
        let (einsum, leaves) = fuse_operands(&self.einsum, operands, compiler.pool())?;
        let leaves: Vec<&TensorTrain<T>> = leaves.iter().map(|tt| tt.as_ref()).collect();
        compiler.running(&einsum, &leaves)
    }
}

macro_rules! operation {
    ($(#[$meta:meta])* $name:ident = $literal:literal) => {
        $(#[$meta])*
        pub fn $name() -> &'static Operation {
            static OPERATION: OnceLock<Operation> = OnceLock::new();
            OPERATION.get_or_init(|| {
                Operation::declare(stringify!($name), $literal).expect("Invalid tt-einsum literal")
            })
        }
    };
}

/// Operations declared by tt-einsum literals, initialized at first use
pub mod declared {
    use super::Operation;
    use std::sync::OnceLock;

    operation!(
        /// Elementwise product of TT
        multiply = "independent: a i b, c i d -> ac i bd"
    );
    operation!(
        /// Elementwise product of TT-matrix
        multiply_matrix = "independent: a i j b, c i j d -> ac i j bd"
    );
    operation!(matvec = "independent: a i j b, c j d -> ac i bd");
    operation!(matmul = "independent: a i j b, c j k d -> ac i k bd");
    operation!(
        /// Inner product of TT regarded as flat vectors
        flat_inner = "running: a i b, c i d, a c -> b d"
    );
    operation!(
        /// Inner product of TT-matrix regarded as flat vectors
        flat_inner_matrix = "running: a i j b, c i j d, a c -> b d"
    );
}

fn format_mismatch(name: &str, formats: &[ChainFormat]) -> Error {
    Error::ShapeMismatch(format!("{} is not defined for {:?}", name, formats))
}

fn multiply_for(a: ChainFormat, b: ChainFormat) -> Result<&'static Operation> {
    match (a, b) {
        (ChainFormat::Tensor, ChainFormat::Tensor) => Ok(declared::multiply()),
        (ChainFormat::Matrix, ChainFormat::Matrix) => Ok(declared::multiply_matrix()),
        _ => Err(format_mismatch("multiply", &[a, b])),
    }
}

fn matvec_for(a: ChainFormat, b: ChainFormat) -> Result<&'static Operation> {
    match (a, b) {
        (ChainFormat::Matrix, ChainFormat::Tensor) => Ok(declared::matvec()),
        _ => Err(format_mismatch("matvec", &[a, b])),
    }
}

fn matmul_for(a: ChainFormat, b: ChainFormat) -> Result<&'static Operation> {
    match (a, b) {
        (ChainFormat::Matrix, ChainFormat::Matrix) => Ok(declared::matmul()),
        _ => Err(format_mismatch("matmul", &[a, b])),
    }
}

fn flat_inner_for(a: ChainFormat, b: ChainFormat) -> Result<&'static Operation> {
    match (a, b) {
        (ChainFormat::Tensor, ChainFormat::Tensor) => Ok(declared::flat_inner()),
        (ChainFormat::Matrix, ChainFormat::Matrix) => Ok(declared::flat_inner_matrix()),
        _ => Err(format_mismatch("flat_inner", &[a, b])),
    }
}

/// Reshape the last accumulator of flat inner product into the batch shape
fn reduce<T: LinalgScalar>(mut accumulators: Vec<ArrayD<T>>) -> Result<ArrayD<T>> {
    let last = accumulators
        .pop()
        .ok_or_else(|| Error::ShapeMismatch("no accumulator".to_string()))?;
    // the trailing two axes are the boundary ranks of size 1
    let batch_shape = last.shape()[..last.ndim() - 2].to_vec();
    Ok(last.into_shape(IxDyn(&batch_shape))?)
}

/// Elementwise product of two TT or two TT-matrices
pub fn multiply<T: LinalgScalar>(a: &TensorTrain<T>, b: &TensorTrain<T>) -> Result<TensorTrain<T>> {
    multiply_for(a.format(), b.format())?.call(&Compiler::new(), &[a, b])
}

/// TT-matrix and TT-vector product
pub fn matvec<T: LinalgScalar>(a: &TensorTrain<T>, b: &TensorTrain<T>) -> Result<TensorTrain<T>> {
    matvec_for(a.format(), b.format())?.call(&Compiler::new(), &[a, b])
}

/// Product of two TT-matrices
pub fn matmul<T: LinalgScalar>(a: &TensorTrain<T>, b: &TensorTrain<T>) -> Result<TensorTrain<T>> {
    matmul_for(a.format(), b.format())?.call(&Compiler::new(), &[a, b])
}

/// Inner product of chains regarded as flat vectors
///
/// The result has the batch shape, or is 0-dimensional without batch dimensions.
pub fn flat_inner<T: LinalgScalar>(a: &TensorTrain<T>, b: &TensorTrain<T>) -> Result<ArrayD<T>> {
    let op = flat_inner_for(a.format(), b.format())?;
    reduce(Compiler::new().running(op.einsum(), &[a, b])?)
}

/// Reconstruct the full tensor of an unbatched chain
fn full_unbatched<T: LinalgScalar>(tt: &TensorTrain<T>) -> Result<ArrayD<T>> {
    let mut acc = Array2::<T>::ones((1, 1));
    let mut modes = Vec::new();
    for core in tt.cores() {
        let shape = core.shape();
        let (left, right) = (shape[0], shape[shape.len() - 1]);
        let mode = &shape[1..shape.len() - 1];
        let n: usize = mode.iter().product();
        modes.extend_from_slice(mode);
        let core = core.to_shape((left, n * right))?;
        let rows = acc.nrows();
        acc = acc.dot(&core).into_shape((rows * n, right))?;
    }
    let full = acc.into_shape(IxDyn(&modes))?;
    match tt.format() {
        ChainFormat::Tensor => Ok(full),
        ChainFormat::Matrix => {
            // (row0, col0, row1, col1, ...) -> (row0, row1, ..., col0, col1, ...)
            let d = tt.len();
            let axes: Vec<usize> = (0..d).map(|k| 2 * k).chain((0..d).map(|k| 2 * k + 1)).collect();
            let full = full.permuted_axes(IxDyn(&axes)).as_standard_layout().into_owned();
            Ok(full.into_shape(IxDyn(&tt.shape()))?)
        }
    }
}

/// Reconstruct the full tensor, or the full matrix for TT-matrix
///
/// Batch dimensions are kept as the leading axes.
pub fn full<T: LinalgScalar>(tt: &TensorTrain<T>) -> Result<ArrayD<T>> {
    vmap(&[tt], &|tts: &[&TensorTrain<T>]| full_unbatched(tts[0]))
}

impl<T: LinalgScalar> Node<T> {
    /// Elementwise product, see [multiply]
    pub fn multiply(&self, other: &Node<T>) -> Result<Node<T>> {
        multiply_for(self.format(), other.format())?.apply(&[self.clone(), other.clone()])
    }

    /// TT-matrix and TT-vector product, see [matvec]
    pub fn matvec(&self, other: &Node<T>) -> Result<Node<T>> {
        matvec_for(self.format(), other.format())?.apply(&[self.clone(), other.clone()])
    }

    /// Product of TT-matrices, see [matmul]
    pub fn matmul(&self, other: &Node<T>) -> Result<Node<T>> {
        matmul_for(self.format(), other.format())?.apply(&[self.clone(), other.clone()])
    }

    /// Inner product with producers of both operands fused, see [flat_inner]
    pub fn flat_inner<B, P>(&self, other: &Node<T>, compiler: &Compiler<B, P>) -> Result<ArrayD<T>>
    where
        B: Contract<T>,
        P: LabelPool,
    {
        let op = flat_inner_for(self.format(), other.format())?;
        reduce(op.run(compiler, &[self.clone(), other.clone()])?)
    }
}

/// Evaluate an expression on nodes with all intermediates fused
///
/// Each input is wrapped as a leaf node, and the node returned by `f`
/// is materialized into a chain.
pub fn fuse<T, B, P, F>(
    compiler: &Compiler<B, P>,
    inputs: &[Arc<TensorTrain<T>>],
    f: F,
) -> Result<TensorTrain<T>>
where
    T: LinalgScalar,
    B: Contract<T>,
    P: LabelPool,
    F: FnOnce(&[Node<T>]) -> Result<Node<T>>,
{
    let nodes: Vec<Node<T>> = inputs.iter().cloned().map(Node::Leaf).collect();
    let tt = f(&nodes)?.materialize(compiler)?;
    Ok(Arc::try_unwrap(tt).unwrap_or_else(|tt| (*tt).clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    #[test]
    fn declarations() {
        assert_eq!(declared::multiply().name(), "multiply");
        assert_eq!(declared::matmul().einsum().kind(), EinsumKind::Independent);
        assert_eq!(declared::flat_inner().einsum().kind(), EinsumKind::Running);
        // initialized once
        assert!(std::ptr::eq(declared::matvec(), declared::matvec()));
    }

    #[test]
    fn full_tensor() {
        let a = chain(&[[1, 2, 3], [3, 4, 1]], 0.2);
        let full = full(&a).unwrap();
        assert_eq!(full.shape(), &[2, 4]);
        let (c0, c1) = (&a.cores()[0], &a.cores()[1]);
        for i in 0..2 {
            for j in 0..4 {
                let expected: f64 = (0..3).map(|r| c0[[0, i, r]] * c1[[r, j, 0]]).sum();
                approx::assert_abs_diff_eq!(full[[i, j]], expected, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn full_empty_batch() {
        let a = batched_chain(0, &[[1, 2, 2], [2, 3, 1]], 0.2);
        assert_eq!(full(&a).unwrap().shape(), &[0, 2, 3]);
        assert_eq!(multiply(&a, &a).unwrap().batch_shape(), &[0]);
    }

    #[test]
    fn full_matrix() {
        let m = matrix_chain(&[[1, 2, 3, 2], [2, 2, 2, 1]], 0.4);
        let full = full(&m).unwrap();
        assert_eq!(full.shape(), &[4, 6]);
        let (c0, c1) = (&m.cores()[0], &m.cores()[1]);
        for (i0, i1, j0, j1) in matrix_indices(2, 2, 3, 2) {
            let expected: f64 = (0..2).map(|r| c0[[0, i0, j0, r]] * c1[[r, i1, j1, 0]]).sum();
            let value = full[[i0 * 2 + i1, j0 * 2 + j1]];
            approx::assert_abs_diff_eq!(value, expected, epsilon = 1e-12);
        }
    }

    fn matrix_indices(
        n0: usize,
        n1: usize,
        m0: usize,
        m1: usize,
    ) -> Vec<(usize, usize, usize, usize)> {
        let mut indices = Vec::new();
        for i0 in 0..n0 {
            for i1 in 0..n1 {
                for j0 in 0..m0 {
                    for j1 in 0..m1 {
                        indices.push((i0, i1, j0, j1));
                    }
                }
            }
        }
        indices
    }

    #[test]
    fn matvec_dense() {
        let m = matrix_chain(&[[1, 2, 3, 2], [2, 2, 2, 1]], 0.4);
        let v = chain(&[[1, 3, 2], [2, 2, 1]], 0.8);
        let mv = matvec(&m, &v).unwrap();
        assert_eq!(mv.tt_ranks(), vec![1, 4, 1]);
        let expected = full(&m)
            .unwrap()
            .into_dimensionality::<ndarray::Ix2>()
            .unwrap()
            .dot(&full(&v).unwrap().into_shape(6).unwrap());
        assert_close(&full(&mv).unwrap().into_shape(IxDyn(&[4])).unwrap(), &expected.into_dyn());
    }

    #[test]
    fn matmul_dense() {
        let a = matrix_chain(&[[1, 2, 3, 2], [2, 2, 2, 1]], 0.4);
        let b = matrix_chain(&[[1, 3, 2, 3], [3, 2, 1, 1]], 0.5);
        let ab = matmul(&a, &b).unwrap();
        assert!(ab.is_matrix());
        assert_eq!(ab.shape(), vec![4, 2]);
        let fa = full(&a).unwrap().into_dimensionality::<ndarray::Ix2>().unwrap();
        let fb = full(&b).unwrap().into_dimensionality::<ndarray::Ix2>().unwrap();
        assert_close(&full(&ab).unwrap(), &fa.dot(&fb).into_dyn());
    }

    #[test]
    fn flat_inner_is_sum_of_squares() {
        let a = chain(&[[1, 2, 3], [3, 3, 2], [2, 2, 1]], 0.3);
        let inner = flat_inner(&a, &a).unwrap();
        assert_eq!(inner.ndim(), 0);
        let expected: f64 = full(&a).unwrap().iter().map(|x| x * x).sum();
        approx::assert_abs_diff_eq!(inner.sum(), expected, epsilon = 1e-10);
    }

    #[test]
    fn batched_flat_inner() {
        let a = batched_chain(3, &[[1, 2, 2], [2, 2, 1]], 0.3);
        let b = batched_chain(3, &[[1, 2, 3], [3, 2, 1]], 0.5);
        let inner = flat_inner(&a, &b).unwrap();
        assert_eq!(inner.shape(), &[3]);
        for n in 0..3 {
            let each = flat_inner(&a.batch_index(n).unwrap(), &b.batch_index(n).unwrap()).unwrap();
            approx::assert_abs_diff_eq!(inner[[n]], each.sum(), epsilon = 1e-12);
        }
    }

    #[test]
    fn format_mismatch() {
        let a = chain(&[[1, 2, 1]], 0.3);
        let m = matrix_chain(&[[1, 2, 2, 1]], 0.3);
        assert!(matches!(multiply(&a, &m), Err(Error::ShapeMismatch(_))));
        assert!(matches!(matvec(&a, &m), Err(Error::ShapeMismatch(_))));
        assert!(matches!(matmul(&m, &a), Err(Error::ShapeMismatch(_))));
        assert!(matches!(flat_inner(&m, &a), Err(Error::ShapeMismatch(_))));
    }

    #[test]
    fn fused_inner_of_product() {
        let a = Arc::new(chain(&[[1, 2, 2], [2, 3, 2], [2, 2, 1]], 0.1));
        let b = Arc::new(chain(&[[1, 2, 3], [3, 3, 3], [3, 2, 1]], 0.2));
        let c = Arc::new(chain(&[[1, 2, 2], [2, 3, 1], [1, 2, 1]], 0.3));

        let compiler = Compiler::new();
        let (na, nb, nc) = (Node::leaf(a.clone()), Node::leaf(b.clone()), Node::leaf(c.clone()));
        let ab = na.multiply(&nb).unwrap();
        let fused = ab.flat_inner(&nc, &compiler).unwrap();

        let expected = flat_inner(&multiply(&a, &b).unwrap(), &c).unwrap();
        approx::assert_abs_diff_eq!(fused.sum(), expected.sum(), epsilon = 1e-10);
    }

    #[test]
    fn run_needs_running() {
        let a = Node::from(chain(&[[1, 2, 1]], 0.3));
        assert!(matches!(
            declared::multiply().run(&Compiler::new(), &[a.clone(), a]),
            Err(Error::UnsupportedEinsumKind(_))
        ));
    }

    #[test]
    fn apply_needs_independent() {
        let a = Node::from(chain(&[[1, 2, 1]], 0.3));
        assert!(matches!(
            declared::flat_inner().apply(&[a.clone(), a]),
            Err(Error::UnsupportedEinsumKind(_))
        ));
    }
}
