//! Map a function on unbatched chains over batch dimensions

use crate::{error::Result, tt::TensorTrain};
use ndarray::{ArrayD, Axis, IxDyn, LinalgScalar};
use std::borrow::Cow;

/// Apply `f` to every element of the batch dimensions, and stack the results
///
/// The batch dimensions are determined by the first operand.
/// Each batch dimension is peeled off from the outermost one,
/// and operands without batch dimensions are passed to every element as is.
/// An empty batch dimension gives an empty result of the shape `f` returns for an element.
///
/// ```
/// use ndarray::{ArrayD, IxDyn};
/// use tt_einsum::{vmap::vmap, TensorTrain};
///
/// // batch of 3 chains, each of which has a single core
/// let tt = TensorTrain::new(vec![ArrayD::<f64>::ones(IxDyn(&[3, 1, 2, 1]))]).unwrap();
/// let lengths = vmap(&[&tt], &|tts: &[&TensorTrain<f64>]| {
///     Ok(ArrayD::from_elem(IxDyn(&[]), tts[0].len() as f64))
/// })
/// .unwrap();
/// assert_eq!(lengths.shape(), &[3]);
/// ```
pub fn vmap<T, F>(operands: &[&TensorTrain<T>], f: &F) -> Result<ArrayD<T>>
where
    T: LinalgScalar,
    F: Fn(&[&TensorTrain<T>]) -> Result<ArrayD<T>>,
{
    let size = match operands.first() {
        Some(first) if first.num_batch_dims() > 0 => first.batch_shape()[0],
        _ => return f(operands),
    };
    if size == 0 {
        // shape of each element is given by `f` on a zero-filled element
        let elements = select_elements(operands, zero_element)?;
        let elements: Vec<&TensorTrain<T>> = elements.iter().map(|tt| &**tt).collect();
        let element = vmap(&elements, f)?;
        let shape = [&[0][..], element.shape()].concat();
        return Ok(ArrayD::zeros(IxDyn(&shape)));
    }
    let mut results = Vec::with_capacity(size);
    for index in 0..size {
        let elements = select_elements(operands, |tt| tt.batch_index(index))?;
        let elements: Vec<&TensorTrain<T>> = elements.iter().map(|tt| &**tt).collect();
        results.push(vmap(&elements, f)?);
    }
    let views: Vec<_> = results.iter().map(|result| result.view()).collect();
    Ok(ndarray::stack(Axis(0), &views)?)
}

/// Select an element from each batched operand, and borrow unbatched ones
fn select_elements<'a, T, S>(
    operands: &[&'a TensorTrain<T>],
    select: S,
) -> Result<Vec<Cow<'a, TensorTrain<T>>>>
where
    T: LinalgScalar,
    S: Fn(&TensorTrain<T>) -> Result<TensorTrain<T>>,
{
    operands
        .iter()
        .map(|tt| {
            if tt.num_batch_dims() > 0 {
                select(tt).map(Cow::Owned)
            } else {
                Ok(Cow::Borrowed(*tt))
            }
        })
        .collect()
}

/// Chain of zeros shaped as an element of the outermost batch dimension
fn zero_element<T: LinalgScalar>(tt: &TensorTrain<T>) -> Result<TensorTrain<T>> {
    let cores = tt
        .cores()
        .iter()
        .map(|core| ArrayD::zeros(IxDyn(&core.shape()[1..])))
        .collect();
    TensorTrain::from_cores(cores, tt.format())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::*;

    fn first_element(tts: &[&TensorTrain<f64>]) -> Result<ArrayD<f64>> {
        let value: f64 = tts.iter().map(|tt| tt.cores()[0].iter().next().unwrap()).sum();
        Ok(ArrayD::from_elem(IxDyn(&[]), value))
    }

    #[test]
    fn nested_batch() {
        let a = batched_chain(2, &[[1, 2, 1]], 0.3);
        let core = a.cores()[0].clone().insert_axis(Axis(0));
        let stacked =
            ndarray::concatenate(Axis(0), &[core.view(), core.view(), core.view()]).unwrap();
        let aa = TensorTrain::new(vec![stacked]).unwrap();
        assert_eq!(aa.batch_shape(), &[3, 2]);

        let result = vmap(&[&aa], &first_element).unwrap();
        assert_eq!(result.shape(), &[3, 2]);
        for n in 0..2 {
            let each = first_element(&[&a.batch_index(n).unwrap()]).unwrap();
            assert_eq!(result[[2, n]], each.sum());
        }
    }

    #[test]
    fn unbatched_operand_is_shared() {
        let a = batched_chain(3, &[[1, 2, 1]], 0.3);
        let b = chain(&[[1, 2, 1]], 0.7);
        let result = vmap(&[&a, &b], &first_element).unwrap();
        assert_eq!(result.shape(), &[3]);
        for n in 0..3 {
            let each = first_element(&[&a.batch_index(n).unwrap(), &b]).unwrap();
            assert_eq!(result[[n]], each.sum());
        }
    }

    #[test]
    fn empty_batch() {
        let a = batched_chain(0, &[[1, 2, 2], [2, 3, 1]], 0.3);
        let b = chain(&[[1, 2, 2], [2, 3, 1]], 0.7);
        let result = vmap(&[&a, &b], &|tts: &[&TensorTrain<f64>]| {
            Ok(ArrayD::zeros(IxDyn(&[tts.len(), tts[0].len() + 3])))
        })
        .unwrap();
        assert_eq!(result.shape(), &[0, 2, 5]);
    }

    #[test]
    fn unbatched() {
        let a = chain(&[[1, 2, 1]], 0.3);
        let result = vmap(&[&a], &first_element).unwrap();
        assert_eq!(result.ndim(), 0);
    }
}
