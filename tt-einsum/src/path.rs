//! Summation order of a contraction

use crate::{
    error::{Error, Result},
    subscripts::*,
};

#[cfg_attr(doc, katexit::katexit)]
/// Summation order of a contraction
///
/// The Einstein summation rule eliminates the summation symbol $\sum$
/// from tensor terms, e.g. $\sum_{i \in I} x_i y_i$ is abbreviated into $x_i y_i$.
/// This is based on the fact that we can exchange the summation order
/// if their ranges are finite:
/// $$
/// \sum_{j \in J} \sum_{k \in K} a_{ij} b_{jk} c_{kl}
/// = \sum_{k \in K} \sum_{j \in J} a_{ij} b_{jk} c_{kl}
/// $$
///
/// However, we have to determine the order to evaluate these terms on computer.
/// The order is represented by a list of indices to be summed up;
/// `['j', 'k']` means first sums against `j` and then sums against `k`.
/// The result does not depend on the order except for rounding.
#[derive(Debug, PartialEq, Eq)]
pub struct Path {
    pub subscripts: Subscripts,
    pub path: Vec<char>,
}

impl Path {
    /// Manually set summation order
    ///
    /// `path` must be a permutation of [Subscripts::summation_indices].
    pub fn manual(subscripts: Subscripts, path: Vec<char>) -> Result<Self> {
        let mut sorted = path.clone();
        sorted.sort_unstable();
        let expected: Vec<char> = subscripts.summation_indices().into_iter().collect();
        if sorted != expected {
            return Err(Error::InvalidSubscripts(format!(
                "summation order {:?} does not match the summed indices {:?} of `{}`",
                path, expected, subscripts
            )));
        }
        Ok(Path { subscripts, path })
    }

    /// Alphabetical order
    ///
    /// ```
    /// use tt_einsum::{path::Path, subscripts::Subscripts};
    ///
    /// let subscripts: Subscripts = "ij,ji->".parse().unwrap();
    /// let path = Path::alphabetical(subscripts);
    /// assert_eq!(path.path, &['i', 'j']);
    /// ```
    pub fn alphabetical(subscripts: Subscripts) -> Self {
        let path = subscripts.summation_indices().into_iter().collect();
        Path { subscripts, path }
    }

    /// Sum up the indices listed in `priority` first, in the given order,
    /// and the others alphabetically
    ///
    /// Labels of `priority` which are not summed in `subscripts` are skipped,
    /// since fusion relabels the tt-einsum before it reaches a backend.
    ///
    /// ```
    /// use tt_einsum::{path::Path, subscripts::Subscripts};
    ///
    /// let subscripts: Subscripts = "ij,jk,kl->il".parse().unwrap();
    /// let path = Path::prioritized(subscripts, &['z', 'k']);
    /// assert_eq!(path.path, &['k', 'j']);
    /// ```
    pub fn prioritized(subscripts: Subscripts, priority: &[char]) -> Self {
        let mut rest = subscripts.summation_indices();
        let mut path = Vec::with_capacity(rest.len());
        for c in priority {
            if rest.remove(c) {
                path.push(*c);
            }
        }
        path.extend(rest);
        Path { subscripts, path }
    }

    /// Construct a path as the hint requests
    pub fn with_hint(subscripts: Subscripts, optimize: &Optimize) -> Self {
        match optimize {
            Optimize::Alphabetical => Self::alphabetical(subscripts),
            Optimize::Manual(priority) => Self::prioritized(subscripts, priority),
        }
    }
}

/// Hint for the summation order passed to a contraction backend
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Optimize {
    /// Sum up indices in alphabetical order
    #[default]
    Alphabetical,
    /// Sum up the listed indices first in the given order, see [Path::prioritized]
    Manual(Vec<char>),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn manual() {
        let subscripts: Subscripts = "ij,jk,kl->il".parse().unwrap();
        let path = Path::manual(subscripts.clone(), vec!['k', 'j']).unwrap();
        assert_eq!(path.path, vec!['k', 'j']);

        assert!(Path::manual(subscripts.clone(), vec!['k']).is_err());
        assert!(Path::manual(subscripts, vec!['k', 'i']).is_err());
    }

    #[test]
    fn alphabetical_includes_single_indices() {
        let subscripts: Subscripts = "ij,jk->".parse().unwrap();
        let path = Path::alphabetical(subscripts);
        assert_eq!(path.path, vec!['i', 'j', 'k']);
    }

    #[test]
    fn prioritized() {
        let subscripts: Subscripts = "...efg,...hfj,...cfd,...ehc->...gjd".parse().unwrap();
        let path = Path::with_hint(subscripts.clone(), &Optimize::Manual(vec!['h', 'a', 'f', 'h']));
        assert_eq!(path.path, vec!['h', 'f', 'c', 'e']);

        let path = Path::with_hint(subscripts, &Optimize::Manual(vec!['a', 'c', 'i']));
        assert_eq!(path.path, vec!['c', 'e', 'f', 'h']);
    }
}
