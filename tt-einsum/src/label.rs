//! Labels, label substitution, and pools of vacant labels

use crate::error::{Error, Result};
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt,
};

/// Sequence of labels collapsed into a single axis of a TT core, e.g. `ac`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Group(Vec<char>);

impl Group {
    pub fn new(labels: Vec<char>) -> Self {
        Group(labels)
    }

    pub fn labels(&self) -> &[char] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Group {
    fn from(labels: &str) -> Self {
        Group(labels.chars().collect())
    }
}

impl fmt::Display for Group {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in &self.0 {
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// Substitution of labels
///
/// A label may be replaced by several labels, e.g. `a -> ac`,
/// which happens when a rank index of a consumer is threaded
/// into the composite rank of its producer.
/// Labels without an entry are kept as is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mapping(BTreeMap<char, Vec<char>>);

impl Mapping {
    pub fn new() -> Self {
        Mapping::default()
    }

    /// Map `from[n]` to `to[n]` for each `n`
    pub fn injective(from: &[char], to: &[char]) -> Self {
        debug_assert_eq!(from.len(), to.len());
        Mapping(from.iter().zip(to).map(|(f, t)| (*f, vec![*t])).collect())
    }

    pub fn insert(&mut self, from: char, to: &[char]) {
        self.0.insert(from, to.to_vec());
    }

    pub fn get(&self, label: char) -> Option<&[char]> {
        self.0.get(&label).map(Vec::as_slice)
    }

    pub fn apply(&self, group: &Group) -> Group {
        Group(
            group
                .0
                .iter()
                .flat_map(|c| match self.0.get(c) {
                    Some(to) => to.clone(),
                    None => vec![*c],
                })
                .collect(),
        )
    }
}

/// Source of labels not used in a tt-einsum yet
pub trait LabelPool {
    /// Issue `count` distinct labels, none of which is in `used`
    fn vacant(&self, used: &BTreeSet<char>, count: usize) -> Result<Vec<char>>;
}

/// Finite set of labels
///
/// Fusion fails with [Error::AlphabetExhausted] if the set does not have
/// enough vacant labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alphabet {
    symbols: Vec<char>,
}

impl Alphabet {
    /// Labels must be alphabetic as indices of subscripts, and duplicates are removed
    ///
    /// ```
    /// use tt_einsum::{Alphabet, Error};
    ///
    /// assert!(Alphabet::new("abcxyz".chars()).is_ok());
    /// assert!(matches!(Alphabet::new("abc012".chars()), Err(Error::InvalidSubscripts(_))));
    /// ```
    pub fn new(symbols: impl IntoIterator<Item = char>) -> Result<Self> {
        let mut seen = BTreeSet::new();
        let mut labels = Vec::new();
        for c in symbols {
            if !c.is_alphabetic() {
                return Err(Error::InvalidSubscripts(format!(
                    "`{}` cannot be used as a label",
                    c
                )));
            }
            if seen.insert(c) {
                labels.push(c);
            }
        }
        Ok(Alphabet { symbols: labels })
    }

    /// `a` to `z`
    pub fn lowercase() -> Self {
        Alphabet {
            symbols: ('a'..='z').collect(),
        }
    }

    /// `a` to `z` and `A` to `Z`
    pub fn letters() -> Self {
        Alphabet {
            symbols: ('a'..='z').chain('A'..='Z').collect(),
        }
    }
}

impl LabelPool for Alphabet {
    fn vacant(&self, used: &BTreeSet<char>, count: usize) -> Result<Vec<char>> {
        let vacant: Vec<char> = self
            .symbols
            .iter()
            .filter(|c| !used.contains(c))
            .cloned()
            .collect();
        if vacant.len() < count {
            return Err(Error::AlphabetExhausted {
                required: count,
                available: vacant.len(),
            });
        }
        Ok(vacant.into_iter().take(count).collect())
    }
}

/// Unbounded label pool
///
/// This works as a simple counter over alphabetic code points,
/// starting from `a`-`z` and `A`-`Z` and continuing into Greek and beyond,
/// which issues the first `count` labels not used yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Namespace;

impl Namespace {
    fn labels() -> impl Iterator<Item = char> {
        ('a'..='z').chain('A'..='Z').chain(
            (0x03B1..=u32::from(char::MAX))
                .filter_map(char::from_u32)
                .filter(|c| c.is_alphabetic()),
        )
    }
}

impl LabelPool for Namespace {
    fn vacant(&self, used: &BTreeSet<char>, count: usize) -> Result<Vec<char>> {
        let vacant: Vec<char> = Self::labels()
            .filter(|c| !used.contains(c))
            .take(count)
            .collect();
        if vacant.len() < count {
            return Err(Error::AlphabetExhausted {
                required: count,
                available: vacant.len(),
            });
        }
        Ok(vacant)
    }
}
