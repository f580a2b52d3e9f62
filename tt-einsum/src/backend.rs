//! Dense einsum contraction on [ndarray](https://crates.io/crates/ndarray) arrays

use crate::{
    error::{Error, Result},
    path::{Optimize, Path},
    subscripts::{Label, Subscript, Subscripts},
};
use ndarray::{ArrayD, ArrayViewD, Dimension, IxDyn, LinalgScalar};
use std::collections::{btree_map::Entry, BTreeMap};

/// Backend executing a flat einsum, e.g. `...aib,...cid->...acibd`
pub trait Contract<T> {
    fn contract(
        &self,
        subscripts: &str,
        operands: &[ArrayViewD<'_, T>],
        optimize: &Optimize,
    ) -> Result<ArrayD<T>>;
}

/// Reference backend with naive loops
///
/// This executes the contraction as nested loops over every index,
/// the broadcast dimensions and the output indices outside,
/// and the summed indices inside in the order of [Path]:
///
/// ```ignore
/// for b in 0..n_b {
///     for i in 0..n_i {
///         for k in 0..n_k {
///             for j in 0..n_j {
///                 out[(b, i, k)] += arg0[(b, i, j)] * arg1[(b, j, k)];
///             }
///         }
///     }
/// }
/// ```
///
/// `...` broadcasts as numpy does; broadcast dimensions are aligned to the right
/// and dimensions of size 1 are broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Naive;

/// Loop variable which each axis of operands is indexed by
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Var {
    /// `n`-th broadcast dimension, aligned to the left of the broadcast shape
    Batch(usize),
    Index(char),
}

/// Resolve the loop variable of each axis of an operand
fn resolve_axes(subscript: &Subscript, ndim: usize, nb: usize) -> Vec<Var> {
    let n_ellipsis = ndim - subscript.indices().len();
    let mut vars = Vec::with_capacity(ndim);
    for label in &subscript.0 {
        match label {
            Label::Index(c) => vars.push(Var::Index(*c)),
            Label::Ellipsis => vars.extend((nb - n_ellipsis..nb).map(Var::Batch)),
        }
    }
    vars
}

impl<T: LinalgScalar> Contract<T> for Naive {
    fn contract(
        &self,
        subscripts: &str,
        operands: &[ArrayViewD<'_, T>],
        optimize: &Optimize,
    ) -> Result<ArrayD<T>> {
        let subscripts: Subscripts = subscripts.parse()?;
        if subscripts.inputs.len() != operands.len() {
            return Err(Error::ShapeMismatch(format!(
                "`{}` takes {} operands, got {}",
                subscripts,
                subscripts.inputs.len(),
                operands.len()
            )));
        }

        // number of broadcast dimensions of each operand
        let mut n_ellipsis = Vec::with_capacity(operands.len());
        for (argc, (subscript, operand)) in subscripts.inputs.iter().zip(operands).enumerate() {
            let n_indices = subscript.indices().len();
            let fits = if subscript.has_ellipsis() {
                operand.ndim() >= n_indices
            } else {
                operand.ndim() == n_indices
            };
            if !fits {
                return Err(Error::ShapeMismatch(format!(
                    "operand {} of shape {:?} does not fit subscript `{}`",
                    argc,
                    operand.shape(),
                    subscript
                )));
            }
            n_ellipsis.push(operand.ndim() - n_indices);
        }
        let nb = n_ellipsis.iter().cloned().max().unwrap_or(0);

        let axes: Vec<Vec<Var>> = subscripts
            .inputs
            .iter()
            .zip(operands)
            .map(|(subscript, operand)| resolve_axes(subscript, operand.ndim(), nb))
            .collect();

        // sizes of loop variables
        let mut batch_shape = vec![1; nb];
        let mut sizes: BTreeMap<char, usize> = BTreeMap::new();
        for (argc, (vars, operand)) in axes.iter().zip(operands).enumerate() {
            for (var, &n) in vars.iter().zip(operand.shape()) {
                match var {
                    Var::Batch(b) => {
                        if batch_shape[*b] == 1 {
                            batch_shape[*b] = n;
                        } else if n != 1 && n != batch_shape[*b] {
                            return Err(Error::ShapeMismatch(format!(
                                "operand {} cannot be broadcast: {} against {}",
                                argc, n, batch_shape[*b]
                            )));
                        }
                    }
                    Var::Index(c) => match sizes.entry(*c) {
                        Entry::Occupied(entry) => {
                            if *entry.get() != n {
                                return Err(Error::ShapeMismatch(format!(
                                    "index `{}` has size {} in operand {}, but {} elsewhere",
                                    c,
                                    n,
                                    argc,
                                    entry.get()
                                )));
                            }
                        }
                        Entry::Vacant(entry) => {
                            entry.insert(n);
                        }
                    },
                }
            }
        }

        let output_ndim = subscripts.output.indices().len()
            + if subscripts.output.has_ellipsis() { nb } else { 0 };
        let output_vars = resolve_axes(&subscripts.output, output_ndim, nb);
        let path = Path::with_hint(subscripts.clone(), optimize);

        // loop order: broadcast dimensions, output indices, then summed indices
        let mut loop_vars: Vec<Var> = (0..nb).map(Var::Batch).collect();
        let summed = path.path.iter().map(|c| Var::Index(*c));
        for var in output_vars.iter().cloned().chain(summed) {
            if !loop_vars.contains(&var) {
                loop_vars.push(var);
            }
        }
        let loop_sizes: Vec<usize> = loop_vars
            .iter()
            .map(|var| match var {
                Var::Batch(b) => batch_shape[*b],
                Var::Index(c) => sizes[c],
            })
            .collect();
        let position = |var: &Var| {
            loop_vars
                .iter()
                .position(|v| v == var)
                .expect("every variable has a loop")
        };

        // position of loop variable indexing each axis, `None` for broadcast axes of size 1
        let operand_axes: Vec<Vec<Option<usize>>> = axes
            .iter()
            .zip(operands)
            .map(|(vars, operand)| {
                vars.iter()
                    .zip(operand.shape())
                    .map(|(var, &n)| match var {
                        Var::Batch(b) if n == 1 && batch_shape[*b] != 1 => None,
                        _ => Some(position(var)),
                    })
                    .collect()
            })
            .collect();
        let output_axes: Vec<usize> = output_vars.iter().map(position).collect();
        let output_shape: Vec<usize> = output_axes.iter().map(|p| loop_sizes[*p]).collect();

        let mut out = ArrayD::<T>::zeros(IxDyn(&output_shape));
        let mut arg_index: Vec<Vec<usize>> =
            operands.iter().map(|op| vec![0; op.ndim()]).collect();
        let mut out_index = vec![0; output_axes.len()];
        for point in ndarray::indices(IxDyn(&loop_sizes)) {
            let point = point.slice();
            let mut prod = T::one();
            for ((operand, axes), index) in
                operands.iter().zip(&operand_axes).zip(&mut arg_index)
            {
                for (i, axis) in index.iter_mut().zip(axes) {
                    *i = axis.map_or(0, |p| point[p]);
                }
                prod = prod * operand[index.as_slice()];
            }
            for (i, p) in out_index.iter_mut().zip(&output_axes) {
                *i = point[*p];
            }
            let slot = &mut out[out_index.as_slice()];
            *slot = *slot + prod;
        }
        Ok(out)
    }
}
