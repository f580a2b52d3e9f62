#![cfg_attr(
    all(doc, not(doctest)),
    feature(prelude_import, custom_inner_attributes, proc_macro_hygiene)
)]
#![cfg_attr(all(doc, not(doctest)), katexit::katexit)]
//! Fused contraction of Tensor-Train chains
//!
//! Tensor-Train
//! -------------
//! A tensor $X \in \mathbb{R}^{n_1 \times \cdots \times n_d}$ is represented
//! in Tensor-Train (TT) form as a chain of three-dimensional cores $G_k$:
//! $$
//! X_{i_1 \ldots i_d} = \sum_{\alpha_0, \ldots, \alpha_d}
//!   G_1[\alpha_0, i_1, \alpha_1] G_2[\alpha_1, i_2, \alpha_2] \cdots G_d[\alpha_{d-1}, i_d, \alpha_d]
//! $$
//! where $r_k = \\#\alpha_k$ are TT-ranks and $r_0 = r_d = 1$.
//! A TT-matrix has cores $G_k[\alpha_{k-1}, i_k, j_k, \alpha_k]$ with a row and a column mode.
//! See [TensorTrain].
//!
//! Many operations are computed directly on the cores without the full tensor.
//! The elementwise product $X * Y$ is a chain whose $k$-th core is
//! $$
//! (G_k \otimes H_k)[(\alpha, \gamma), i, (\beta, \delta)]
//!   = G_k[\alpha, i, \beta] H_k[\gamma, i, \delta]
//! $$
//! of TT-ranks $r_k s_k$, and the inner product $(X, Y)$ is a sweep
//! from the left end to the right end carrying a matrix of size $r_k \times s_k$.
//!
//! tt-einsum
//! ----------
//! Both operations are einsum on the cores structured by TT-ranks and modes.
//! We write them as
//!
//! ```text
//! independent: a i b, c i d -> ac i bd
//! running: a i b, c i d, a c -> b d
//! ```
//!
//! where each argument lists groups of labels for the left rank, the modes, and the right rank,
//! and a group of several labels like `ac` is collapsed into a single axis.
//! An `independent` tt-einsum is evaluated at each core position separately into a new chain,
//! while a `running` tt-einsum carries an accumulator, the last argument, along the chain.
//! See [TtEinsum] and [eval].
//!
//! Fusion
//! -------
//! Evaluating $(X * Y, Z)$ naively builds the intermediate chain of ranks $r_k s_k$.
//! Instead, operations on [Node]s are recorded without evaluation,
//! and the tt-einsum of the producer is inlined into that of the consumer
//! so that a single contraction runs against the leaves $X, Y, Z$ at each core.
//! See [fusion] and [ops].
//!

pub mod backend;
pub mod codegen;
pub mod compiler;
pub mod error;
pub mod eval;
pub mod fusion;
pub mod label;
pub mod node;
pub mod ops;
pub mod parser;
pub mod path;
pub mod subscripts;
pub mod tt;
pub mod tt_einsum;
pub mod vmap;

pub use backend::{Contract, Naive};
pub use compiler::Compiler;
pub use error::{Error, Result};
pub use label::{Alphabet, Group, LabelPool, Mapping, Namespace};
pub use node::{Derivation, Node};
pub use path::Optimize;
pub use tt::{ChainFormat, TensorTrain};
pub use tt_einsum::{EinsumKind, TtEinsum, TtEinsumCore};
