//! Tensor-Train chains

use crate::error::{Error, Result};
use ndarray::{ArrayD, Axis, LinalgScalar};

/// Layout of each TT core after the batch dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChainFormat {
    /// `(left_rank, dim, right_rank)`
    Tensor,
    /// `(left_rank, row, col, right_rank)`
    Matrix,
}

impl ChainFormat {
    /// Number of dimensions of a core without batch dimensions
    pub fn core_ndim(&self) -> usize {
        match self {
            ChainFormat::Tensor => 3,
            ChainFormat::Matrix => 4,
        }
    }

    /// Format of a core described by `num_groups` label groups
    pub fn from_num_groups(num_groups: usize) -> Result<Self> {
        match num_groups {
            3 => Ok(ChainFormat::Tensor),
            4 => Ok(ChainFormat::Matrix),
            _ => Err(Error::ShapeMismatch(format!(
                "a TT core has three or four groups, got {}",
                num_groups
            ))),
        }
    }
}

/// Tensor-Train chain, possibly batched
///
/// Each core has shape `(batch..., left_rank, dim, right_rank)`,
/// or `(batch..., left_rank, row, col, right_rank)` for TT-matrix.
/// The right rank of each core equals the left rank of the next core,
/// and the ranks at both ends are 1.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorTrain<T> {
    cores: Vec<ArrayD<T>>,
    format: ChainFormat,
}

impl<T: LinalgScalar> TensorTrain<T> {
    /// TT chain whose cores are `(batch..., left_rank, dim, right_rank)`
    pub fn new(cores: Vec<ArrayD<T>>) -> Result<Self> {
        Self::from_cores(cores, ChainFormat::Tensor)
    }

    /// TT-matrix chain whose cores are `(batch..., left_rank, row, col, right_rank)`
    pub fn matrix(cores: Vec<ArrayD<T>>) -> Result<Self> {
        Self::from_cores(cores, ChainFormat::Matrix)
    }

    pub fn from_cores(cores: Vec<ArrayD<T>>, format: ChainFormat) -> Result<Self> {
        let first = cores
            .first()
            .ok_or_else(|| Error::ShapeMismatch("TT chain must have a core".to_string()))?;
        let ndim = first.ndim();
        if ndim < format.core_ndim() {
            return Err(Error::ShapeMismatch(format!(
                "{:?} core needs at least {} dimensions, got {:?}",
                format,
                format.core_ndim(),
                first.shape()
            )));
        }
        let num_batch_dims = ndim - format.core_ndim();
        let batch_shape = &first.shape()[..num_batch_dims];
        for (site, core) in cores.iter().enumerate() {
            if core.ndim() != ndim || &core.shape()[..num_batch_dims] != batch_shape {
                return Err(Error::ShapeMismatch(format!(
                    "core {} has shape {:?} while core 0 has {:?}",
                    site,
                    core.shape(),
                    first.shape()
                )));
            }
        }
        for (site, pair) in cores.windows(2).enumerate() {
            let right = pair[0].shape()[ndim - 1];
            let left = pair[1].shape()[num_batch_dims];
            if right != left {
                return Err(Error::ShapeMismatch(format!(
                    "right rank {} of core {} differs from left rank {} of core {}",
                    right,
                    site,
                    left,
                    site + 1
                )));
            }
        }
        let last = &cores[cores.len() - 1];
        if first.shape()[num_batch_dims] != 1 || last.shape()[ndim - 1] != 1 {
            return Err(Error::ShapeMismatch(
                "TT ranks at both ends must be 1".to_string(),
            ));
        }
        Ok(TensorTrain { cores, format })
    }

    pub fn cores(&self) -> &[ArrayD<T>] {
        &self.cores
    }

    pub fn into_cores(self) -> Vec<ArrayD<T>> {
        self.cores
    }

    /// Number of cores
    pub fn len(&self) -> usize {
        self.cores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cores.is_empty()
    }

    pub fn format(&self) -> ChainFormat {
        self.format
    }

    pub fn is_matrix(&self) -> bool {
        self.format == ChainFormat::Matrix
    }

    pub fn num_batch_dims(&self) -> usize {
        self.cores[0].ndim() - self.format.core_ndim()
    }

    pub fn batch_shape(&self) -> &[usize] {
        &self.cores[0].shape()[..self.num_batch_dims()]
    }

    /// TT-ranks including the boundary ranks, e.g. `[1, 6, 1]`
    pub fn tt_ranks(&self) -> Vec<usize> {
        let nb = self.num_batch_dims();
        let mut ranks: Vec<usize> = self.cores.iter().map(|c| c.shape()[nb]).collect();
        let last = &self.cores[self.cores.len() - 1];
        ranks.push(last.shape()[last.ndim() - 1]);
        ranks
    }

    /// Mode dimensions of each core, `[dim]` or `[row, col]`
    pub fn mode_shapes(&self) -> Vec<Vec<usize>> {
        let nb = self.num_batch_dims();
        self.cores
            .iter()
            .map(|c| c.shape()[nb + 1..c.ndim() - 1].to_vec())
            .collect()
    }

    /// Shape of the full tensor without batch dimensions
    ///
    /// TT-matrix is reconstructed as a matrix
    /// whose rows and columns are products of the row and column modes.
    pub fn shape(&self) -> Vec<usize> {
        let modes = self.mode_shapes();
        match self.format {
            ChainFormat::Tensor => modes.into_iter().map(|m| m[0]).collect(),
            ChainFormat::Matrix => vec![
                modes.iter().map(|m| m[0]).product(),
                modes.iter().map(|m| m[1]).product(),
            ],
        }
    }

    /// Select the `index`-th element of the outermost batch dimension
    pub fn batch_index(&self, index: usize) -> Result<Self> {
        if self.num_batch_dims() == 0 {
            return Err(Error::ShapeMismatch(
                "TT chain has no batch dimension".to_string(),
            ));
        }
        let size = self.batch_shape()[0];
        if index >= size {
            return Err(Error::ShapeMismatch(format!(
                "batch index {} is out of bounds for size {}",
                index, size
            )));
        }
        Ok(TensorTrain {
            cores: self
                .cores
                .iter()
                .map(|c| c.index_axis(Axis(0), index).to_owned())
                .collect(),
            format: self.format,
        })
    }
}
