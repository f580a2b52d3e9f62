//! Provenance of TT chains for fusion

use crate::{
    backend::Contract,
    compiler::Compiler,
    error::{Error, Result},
    fusion::fuse_operands,
    label::LabelPool,
    tt::{ChainFormat, TensorTrain},
    tt_einsum::{EinsumKind, TtEinsum},
};
use ndarray::LinalgScalar;
use std::sync::Arc;

/// TT chain given by user, or a result of operation not evaluated yet
///
/// A derived node records the one operation which produced it.
/// It is evaluated when it is [materialized](Node::materialize),
/// or inlined into the consumer when it becomes an operand of a later operation
/// so that the intermediate chain of composite ranks is never built.
#[derive(Debug)]
pub enum Node<T> {
    Leaf(Arc<TensorTrain<T>>),
    Derived(Arc<Derivation<T>>),
}

// `derive(Clone)` requires `T: Clone`
impl<T> Clone for Node<T> {
    fn clone(&self) -> Self {
        match self {
            Node::Leaf(tt) => Node::Leaf(Arc::clone(tt)),
            Node::Derived(derivation) => Node::Derived(Arc::clone(derivation)),
        }
    }
}

impl<T> From<TensorTrain<T>> for Node<T> {
    fn from(tt: TensorTrain<T>) -> Self {
        Node::Leaf(Arc::new(tt))
    }
}

impl<T> From<Arc<TensorTrain<T>>> for Node<T> {
    fn from(tt: Arc<TensorTrain<T>>) -> Self {
        Node::Leaf(tt)
    }
}

/// Independent tt-einsum and the operands it is invoked with
#[derive(Debug)]
pub struct Derivation<T> {
    einsum: TtEinsum,
    operands: Vec<Node<T>>,
    len: usize,
    format: ChainFormat,
}

impl<T: LinalgScalar> Derivation<T> {
    /// Check the operands against the tt-einsum symbolically
    pub fn new(einsum: TtEinsum, operands: Vec<Node<T>>) -> Result<Self> {
        if einsum.kind() != EinsumKind::Independent {
            return Err(Error::UnsupportedEinsumKind(format!(
                "only independent tt-einsum can be fused: `{}`",
                einsum
            )));
        }
        if operands.len() != einsum.num_operands() {
            return Err(Error::ShapeMismatch(format!(
                "`{}` takes {} operands, got {}",
                einsum,
                einsum.num_operands(),
                operands.len()
            )));
        }
        let len = operands[0].len();
        for (argc, (node, arg)) in operands.iter().zip(einsum.args()).enumerate() {
            if node.len() != len {
                return Err(Error::ShapeMismatch(format!(
                    "operand {} has {} cores while operand 0 has {}",
                    argc,
                    node.len(),
                    len
                )));
            }
            let ndim = node.format().core_ndim();
            if arg.groups().len() != ndim || arg.flat().len() != ndim {
                return Err(Error::ShapeMismatch(format!(
                    "operand {} is {:?} chain, which subscript `{}` does not describe",
                    argc,
                    node.format(),
                    arg
                )));
            }
        }
        let format = ChainFormat::from_num_groups(einsum.res().groups().len())?;
        Ok(Derivation {
            einsum,
            operands,
            len,
            format,
        })
    }
}

impl<T> Derivation<T> {
    /// The tt-einsum of this operation itself, not fused with producers of operands
    pub fn einsum(&self) -> &TtEinsum {
        &self.einsum
    }

    pub fn operands(&self) -> &[Node<T>] {
        &self.operands
    }
}

impl<T> Node<T> {
    pub fn leaf(tt: impl Into<Arc<TensorTrain<T>>>) -> Self {
        Node::Leaf(tt.into())
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn derivation(&self) -> Option<&Derivation<T>> {
        match self {
            Node::Leaf(_) => None,
            Node::Derived(derivation) => Some(derivation.as_ref()),
        }
    }
}

impl<T: LinalgScalar> Node<T> {
    /// Number of cores
    pub fn len(&self) -> usize {
        match self {
            Node::Leaf(tt) => tt.len(),
            Node::Derived(derivation) => derivation.len,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn format(&self) -> ChainFormat {
        match self {
            Node::Leaf(tt) => tt.format(),
            Node::Derived(derivation) => derivation.format,
        }
    }

    pub fn is_matrix(&self) -> bool {
        self.format() == ChainFormat::Matrix
    }

    /// Number of leaves this node is computed from, counted with multiplicity
    pub fn num_leaves(&self) -> usize {
        match self {
            Node::Leaf(_) => 1,
            Node::Derived(derivation) => derivation.operands.iter().map(Node::num_leaves).sum(),
        }
    }

    /// Evaluate this node into a TT chain
    ///
    /// All producers are fused into a single tt-einsum,
    /// which is evaluated once against the leaves.
    /// A leaf is returned as is without copy.
    pub fn materialize<B, P>(&self, compiler: &Compiler<B, P>) -> Result<Arc<TensorTrain<T>>>
    where
        B: Contract<T>,
        P: LabelPool,
    {
        match self {
            Node::Leaf(tt) => Ok(Arc::clone(tt)),
            Node::Derived(derivation) => {
                let (einsum, leaves) =
                    fuse_operands(&derivation.einsum, &derivation.operands, compiler.pool())?;
                let leaves: Vec<&TensorTrain<T>> = leaves.iter().map(|tt| tt.as_ref()).collect();
                Ok(Arc::new(compiler.independent(&einsum, &leaves)?))
            }
        }
    }
}
