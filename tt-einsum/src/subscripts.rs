//! Einsum subscripts, e.g. `...ij,...jk->...ik`
use crate::{
    error::{Error, Result},
    parser,
};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
    str::FromStr,
};

/// Each label appearing in subscript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// Single index, e.g. `i` or `j`
    Index(char),
    /// Ellipsis `...` representing broadcast
    Ellipsis,
}

/// Each subscript appearing in einsum, e.g. `...ij`
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Subscript(pub Vec<Label>);

impl Subscript {
    pub fn indices(&self) -> Vec<char> {
        self.0
            .iter()
            .filter_map(|label| match label {
                Label::Index(c) => Some(*c),
                Label::Ellipsis => None,
            })
            .collect()
    }

    pub fn has_ellipsis(&self) -> bool {
        self.0.contains(&Label::Ellipsis)
    }
}

impl fmt::Display for Subscript {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for label in &self.0 {
            match label {
                Label::Index(c) => write!(f, "{}", c)?,
                Label::Ellipsis => write!(f, "...")?,
            }
        }
        Ok(())
    }
}

/// Einsum subscripts, e.g. `ij,jk->ik`
#[derive(Clone, PartialEq, Eq)]
pub struct Subscripts {
    /// Input subscript, `ij` and `jk`
    pub inputs: Vec<Subscript>,
    /// Output subscript.
    pub output: Subscript,
}

impl fmt::Debug for Subscripts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, input) in self.inputs.iter().enumerate() {
            write!(f, "{}", input)?;
            if n < self.inputs.len() - 1 {
                write!(f, ",")?;
            }
        }
        write!(f, "->{}", self.output)
    }
}

impl fmt::Display for Subscripts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl FromStr for Subscripts {
    type Err = Error;
    fn from_str(input: &str) -> Result<Self> {
        use nom::{combinator::all_consuming, Finish};
        match all_consuming(parser::subscripts)(input).finish() {
            Ok((_, raw)) => Self::from_raw(raw),
            Err(_) => Err(Error::InvalidSubscripts(input.to_string())),
        }
    }
}

impl Subscripts {
    /// Normalize subscripts into "explicit mode"
    ///
    /// [numpy.einsum](https://numpy.org/doc/stable/reference/generated/numpy.einsum.html)
    /// has "explicit mode" including `->`, e.g. `ij,jk->ik` and
    /// "implicit mode" e.g. `ij,jk`.
    /// In implicit mode, the output consists of the indices appearing only once,
    /// reordered alphabetically, and of the broadcast dimensions if any input has `...`.
    ///
    /// ```
    /// use tt_einsum::subscripts::*;
    ///
    /// // Infer output subscripts for implicit mode
    /// let subscripts: Subscripts = "ij,jk".parse().unwrap();
    /// assert_eq!(subscripts.output.indices(), &['i', 'k']);
    ///
    /// // Reordered alphabetically
    /// let subscripts: Subscripts = "ji".parse().unwrap();
    /// assert_eq!(subscripts.output.indices(), &['i', 'j']);
    ///
    /// // Broadcast dimensions come first
    /// let subscripts: Subscripts = "...ij,...jk".parse().unwrap();
    /// assert_eq!(subscripts.to_string(), "...ij,...jk->...ik");
    /// ```
    ///
    pub fn from_raw(raw: parser::RawSubscripts) -> Result<Self> {
        for input in raw.inputs.iter().chain(raw.output.iter()) {
            if input.0.iter().filter(|l| **l == Label::Ellipsis).count() > 1 {
                return Err(Error::InvalidSubscripts(format!(
                    "`...` appears more than once in `{}`",
                    input
                )));
            }
        }
        let output = match raw.output {
            Some(output) => {
                let count = count_indices(&raw.inputs);
                for c in output.indices() {
                    if !count.contains_key(&c) {
                        return Err(Error::InvalidSubscripts(format!(
                            "output index `{}` does not appear in inputs",
                            c
                        )));
                    }
                }
                output
            }
            None => {
                let count = count_indices(&raw.inputs);
                let mut labels = Vec::new();
                if raw.inputs.iter().any(Subscript::has_ellipsis) {
                    labels.push(Label::Ellipsis);
                }
                labels.extend(count.into_iter().filter_map(|(key, value)| {
                    if value == 1 {
                        Some(Label::Index(key))
                    } else {
                        None
                    }
                }));
                Subscript(labels)
            }
        };
        Ok(Subscripts {
            inputs: raw.inputs,
            output,
        })
    }

    /// Indices to be contracted
    ///
    /// ```
    /// use maplit::btreeset;
    /// use tt_einsum::subscripts::Subscripts;
    ///
    /// // Matrix multiplication AB
    /// let subscripts: Subscripts = "ij,jk->ik".parse().unwrap();
    /// assert_eq!(subscripts.contraction_indices(), btreeset!{'j'});
    ///
    /// // Reduce all Tr(AB)
    /// let subscripts: Subscripts = "ij,ji->".parse().unwrap();
    /// assert_eq!(subscripts.contraction_indices(), btreeset!{'i', 'j'});
    ///
    /// // Take diagonal elements
    /// let subscripts: Subscripts = "ii->i".parse().unwrap();
    /// assert_eq!(subscripts.contraction_indices(), btreeset!{});
    /// ```
    pub fn contraction_indices(&self) -> BTreeSet<char> {
        let count = count_indices(&self.inputs);
        let mut subscripts: BTreeSet<char> = count
            .into_iter()
            .filter_map(|(key, value)| if value > 1 { Some(key) } else { None })
            .collect();
        for c in &self.output.indices() {
            subscripts.remove(c);
        }
        subscripts
    }

    /// Indices summed up, i.e. all input indices not kept in the output
    ///
    /// In addition to [Subscripts::contraction_indices],
    /// this contains indices appearing only once, e.g. `i` of `ij->j`.
    pub fn summation_indices(&self) -> BTreeSet<char> {
        let mut indices: BTreeSet<char> = count_indices(&self.inputs).into_keys().collect();
        for c in &self.output.indices() {
            indices.remove(c);
        }
        indices
    }
}

fn count_indices(inputs: &[Subscript]) -> BTreeMap<char, u32> {
    let mut count = BTreeMap::new();
    for input in inputs {
        for c in input.indices() {
            count.entry(c).and_modify(|n| *n += 1).or_insert(1);
        }
    }
    count
}
