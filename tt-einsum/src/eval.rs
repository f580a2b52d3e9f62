//! Evaluate tt-einsum on TT chains
//!
//! - [independent] contracts each core position separately,
//!   and the positions may be evaluated in any order or in parallel
//!   (see [independent_core]).
//! - [running] folds the core positions into an accumulator from left to right,
//!   and each step depends on the previous one.

use crate::{
    backend::Contract,
    error::{Error, Result},
    label::Group,
    path::Optimize,
    tt::{ChainFormat, TensorTrain},
    tt_einsum::{EinsumKind, TtEinsum, TtEinsumCore},
};
use ndarray::{ArrayD, ArrayViewD, IxDyn, LinalgScalar};

fn check_kind(einsum: &TtEinsum, expected: EinsumKind) -> Result<()> {
    if einsum.kind() != expected {
        return Err(Error::UnsupportedEinsumKind(format!(
            "{} evaluator cannot execute `{}`",
            expected, einsum
        )));
    }
    Ok(())
}

/// Check operands against the subscripts, and returns the length of chains
fn check_operands<T: LinalgScalar>(
    einsum: &TtEinsum,
    operands: &[&TensorTrain<T>],
) -> Result<usize> {
    if operands.len() != einsum.num_operands() {
        return Err(Error::ShapeMismatch(format!(
            "`{}` takes {} operands, got {}",
            einsum,
            einsum.num_operands(),
            operands.len()
        )));
    }
    let len = operands[0].len();
    for (argc, (tt, arg)) in operands.iter().zip(einsum.args()).enumerate() {
        if tt.len() != len {
            return Err(Error::ShapeMismatch(format!(
                "operand {} has {} cores while operand 0 has {}",
                argc,
                tt.len(),
                len
            )));
        }
        let ndim = tt.format().core_ndim();
        if arg.groups().len() != ndim || arg.flat().len() != ndim {
            return Err(Error::ShapeMismatch(format!(
                "operand {} is {:?} chain, which subscript `{}` does not describe",
                argc,
                tt.format(),
                arg
            )));
        }
    }
    Ok(len)
}

fn cores_at<'a, T>(operands: &'a [&TensorTrain<T>], position: usize) -> Vec<ArrayViewD<'a, T>>
where
    T: LinalgScalar,
{
    operands
        .iter()
        .map(|tt| tt.cores()[position].view())
        .collect()
}

/// Collapse each group of axes into a single axis, keeping leading batch axes
fn collapse_groups<T: LinalgScalar>(core: ArrayD<T>, res: &TtEinsumCore) -> Result<ArrayD<T>> {
    let group_sizes: Vec<usize> = res.groups().iter().map(Group::len).collect();
    let n_labels: usize = group_sizes.iter().sum();
    if core.ndim() < n_labels {
        return Err(Error::ShapeMismatch(format!(
            "contracted core of shape {:?} has fewer axes than `{}`",
            core.shape(),
            res
        )));
    }
    let (batch, mut rest) = core.shape().split_at(core.ndim() - n_labels);
    let mut shape = batch.to_vec();
    for n in group_sizes {
        let (group, tail) = rest.split_at(n);
        shape.push(group.iter().product());
        rest = tail;
    }
    let core = if core.is_standard_layout() {
        core
    } else {
        core.as_standard_layout().into_owned()
    };
    Ok(core.into_shape(IxDyn(&shape))?)
}

/// Contract the cores at `position` into the core of the resulting chain
pub fn independent_core<T, B>(
    backend: &B,
    optimize: &Optimize,
    einsum: &TtEinsum,
    operands: &[&TensorTrain<T>],
    position: usize,
) -> Result<ArrayD<T>>
where
    T: LinalgScalar,
    B: Contract<T> + ?Sized,
{
    check_kind(einsum, EinsumKind::Independent)?;
    let len = check_operands(einsum, operands)?;
    if position >= len {
        return Err(Error::ShapeMismatch(format!(
            "core position {} is out of chains of length {}",
            position, len
        )));
    }
    let core = backend.contract(&einsum.to_vanilla(), &cores_at(operands, position), optimize)?;
    collapse_groups(core, einsum.res())
}

/// Evaluate [EinsumKind::Independent] tt-einsum into a new chain of the same length
pub fn independent<T, B>(
    backend: &B,
    optimize: &Optimize,
    einsum: &TtEinsum,
    operands: &[&TensorTrain<T>],
) -> Result<TensorTrain<T>>
where
    T: LinalgScalar,
    B: Contract<T> + ?Sized,
{
    check_kind(einsum, EinsumKind::Independent)?;
    let len = check_operands(einsum, operands)?;
    let format = ChainFormat::from_num_groups(einsum.res().groups().len())?;
    let subscripts = einsum.to_vanilla();
    log::debug!("independent `{}` on {} cores", einsum, len);

    let mut cores = Vec::with_capacity(len);
    for position in 0..len {
        let core = backend.contract(&subscripts, &cores_at(operands, position), optimize)?;
        let core = collapse_groups(core, einsum.res())?;
        log::trace!("core {}: {:?}", position, core.shape());
        cores.push(core);
    }
    TensorTrain::from_cores(cores, format)
}

/// Evaluate [EinsumKind::Running] tt-einsum, and returns the accumulator after each core
///
/// The accumulator starts from ones of shape `[1, ..., 1]`, one axis for each label of
/// the accumulator argument. Each returned accumulator has its result groups collapsed
/// into single axes like [independent], and the last one is the full reduction.
pub fn running<T, B>(
    backend: &B,
    optimize: &Optimize,
    einsum: &TtEinsum,
    operands: &[&TensorTrain<T>],
) -> Result<Vec<ArrayD<T>>>
where
    T: LinalgScalar,
    B: Contract<T> + ?Sized,
{
    check_kind(einsum, EinsumKind::Running)?;
    let len = check_operands(einsum, operands)?;
    let acc_labels = einsum
        .accumulator()
        .map(|acc| acc.flat().len())
        .ok_or_else(|| Error::UnsupportedEinsumKind(einsum.to_string()))?;
    let subscripts = einsum.to_vanilla();
    log::debug!("running `{}` on {} cores", einsum, len);

    let mut acc = ArrayD::<T>::ones(IxDyn(&vec![1; acc_labels]));
    let mut results = Vec::with_capacity(len);
    for position in 0..len {
        let next = {
            let mut views = cores_at(operands, position);
            views.push(acc.view());
            backend.contract(&subscripts, &views, optimize)?
        };
        log::trace!("accumulator {}: {:?}", position, next.shape());
        results.push(collapse_groups(next.clone(), einsum.res())?);
        acc = next;
    }
    Ok(results)
}
