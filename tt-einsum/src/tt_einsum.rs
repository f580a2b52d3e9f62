//! tt-einsum, einsum subscripts structured along TT cores
//!
//! A tt-einsum describes one contraction executed on every TT core.
//! Each operand and the result are described by a [TtEinsumCore],
//! a sequence of label [Group]s: the labels of the left TT-rank,
//! of the mode dimension(s), and of the right TT-rank.
//! Several labels in one group are collapsed into a single axis of the core,
//! e.g. `ac` of the result of elementwise product
//!
//! ```text
//! independent: a i b, c i d -> ac i bd
//! ```
//!
//! is the composite TT-rank of the two operands.

use crate::{
    error::{Error, Result},
    label::{Group, Mapping},
    parser,
};
use std::{collections::BTreeSet, fmt, str::FromStr};

/// How a tt-einsum is evaluated along the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EinsumKind {
    /// Each core position is contracted separately into a new TT core
    Independent,
    /// Core positions are folded sequentially into an accumulator
    Running,
}

impl fmt::Display for EinsumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EinsumKind::Independent => write!(f, "independent"),
            EinsumKind::Running => write!(f, "running"),
        }
    }
}

impl FromStr for EinsumKind {
    type Err = Error;
    fn from_str(kind: &str) -> Result<Self> {
        match kind {
            "independent" => Ok(EinsumKind::Independent),
            "running" => Ok(EinsumKind::Running),
            _ => Err(Error::UnsupportedEinsumKind(kind.to_string())),
        }
    }
}

/// Subscript of one operand or of the result, e.g. `ac i bd`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TtEinsumCore {
    groups: Vec<Group>,
}

impl TtEinsumCore {
    pub fn new(groups: Vec<Group>) -> Self {
        TtEinsumCore { groups }
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    /// Labels of all groups concatenated, e.g. `acibd` for `ac i bd`
    pub fn flat(&self) -> Vec<char> {
        self.groups
            .iter()
            .flat_map(|g| g.labels().iter().cloned())
            .collect()
    }

    pub fn relabel(&self, mapping: &Mapping) -> Self {
        TtEinsumCore {
            groups: self.groups.iter().map(|g| mapping.apply(g)).collect(),
        }
    }
}

impl From<&[&str]> for TtEinsumCore {
    fn from(groups: &[&str]) -> Self {
        TtEinsumCore::new(groups.iter().map(|g| Group::from(*g)).collect())
    }
}

impl fmt::Display for TtEinsumCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (n, group) in self.groups.iter().enumerate() {
            if n > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", group)?;
        }
        Ok(())
    }
}

/// Contraction on TT cores, e.g. `independent: a i b, c i d -> ac i bd`
///
/// This is an immutable value;
/// relabeling and fusion create a new tt-einsum.
///
/// Invariants checked by [TtEinsum::new]:
///
/// - there is at least one argument, and no group is empty
/// - every label of the result appears in some argument
/// - for [EinsumKind::Independent], every argument and the result have
///   three groups (TT) or four groups (TT-matrix)
/// - for [EinsumKind::Running], the last argument is the accumulator
///   and has as many groups as the result, and the other arguments have
///   three or four groups
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TtEinsum {
    kind: EinsumKind,
    args: Vec<TtEinsumCore>,
    res: TtEinsumCore,
}

fn is_core_shape(core: &TtEinsumCore) -> bool {
    matches!(core.groups.len(), 3 | 4)
}

impl TtEinsum {
    pub fn new(kind: EinsumKind, args: Vec<TtEinsumCore>, res: TtEinsumCore) -> Result<Self> {
        let einsum = TtEinsum { kind, args, res };
        einsum.validate()?;
        Ok(einsum)
    }

    /// Construct without validation, used by code generated by `tt_einsum!`
    /// which has validated the literal at compile time
    #[doc(hidden)]
    pub fn new_unchecked(kind: EinsumKind, args: Vec<TtEinsumCore>, res: TtEinsumCore) -> Self {
        TtEinsum { kind, args, res }
    }

    fn validate(&self) -> Result<()> {
        let invalid = |reason: &str| Err(Error::InvalidSubscripts(format!("{}: {}", reason, self)));
        if self.args.is_empty() {
            return invalid("no argument");
        }
        if self
            .args
            .iter()
            .chain(std::iter::once(&self.res))
            .any(|core| core.groups.is_empty() || core.groups.iter().any(Group::is_empty))
        {
            return invalid("empty group");
        }
        let inputs: BTreeSet<char> = self.args.iter().flat_map(|arg| arg.flat()).collect();
        if let Some(c) = self.res.flat().into_iter().find(|c| !inputs.contains(c)) {
            return invalid(&format!("result label `{}` does not appear in arguments", c));
        }
        match self.kind {
            EinsumKind::Independent => {
                if !self.args.iter().all(is_core_shape) || !is_core_shape(&self.res) {
                    return invalid("every core must have three or four groups");
                }
            }
            EinsumKind::Running => {
                let (acc, operands) = self
                    .args
                    .split_last()
                    .expect("args never be empty here");
                if operands.is_empty() {
                    return invalid("running tt-einsum needs an operand and an accumulator");
                }
                if !operands.iter().all(is_core_shape) {
                    return invalid("every operand core must have three or four groups");
                }
                if acc.groups.len() != self.res.groups.len() {
                    return invalid("accumulator and result must have the same number of groups");
                }
            }
        }
        Ok(())
    }

    pub fn kind(&self) -> EinsumKind {
        self.kind
    }

    pub fn args(&self) -> &[TtEinsumCore] {
        &self.args
    }

    pub fn res(&self) -> &TtEinsumCore {
        &self.res
    }

    /// Number of TT operands, i.e. arguments except the accumulator of running tt-einsum
    pub fn num_operands(&self) -> usize {
        match self.kind {
            EinsumKind::Independent => self.args.len(),
            EinsumKind::Running => self.args.len() - 1,
        }
    }

    /// The accumulator argument of running tt-einsum
    pub fn accumulator(&self) -> Option<&TtEinsumCore> {
        match self.kind {
            EinsumKind::Independent => None,
            EinsumKind::Running => self.args.last(),
        }
    }

    /// All labels appearing in this tt-einsum
    pub fn labels(&self) -> BTreeSet<char> {
        self.args
            .iter()
            .chain(std::iter::once(&self.res))
            .flat_map(|core| core.flat())
            .collect()
    }

    /// Distinct labels in the order of first appearance in [TtEinsum::to_vanilla]
    pub fn flat_labels(&self) -> Vec<char> {
        let mut seen = BTreeSet::new();
        self.args
            .iter()
            .chain(std::iter::once(&self.res))
            .flat_map(|core| core.flat())
            .filter(|c| seen.insert(*c))
            .collect()
    }

    /// Apply the mapping to every argument and the result
    pub fn relabel(&self, mapping: &Mapping) -> Self {
        TtEinsum {
            kind: self.kind,
            args: self.args.iter().map(|arg| arg.relabel(mapping)).collect(),
            res: self.res.relabel(mapping),
        }
    }

    /// Einsum subscripts executed on each core, with `...` for batch dimensions
    ///
    /// ```
    /// use tt_einsum::TtEinsum;
    ///
    /// let multiply: TtEinsum = "independent: a i b, c i d -> ac i bd".parse().unwrap();
    /// assert_eq!(multiply.to_vanilla(), "...aib,...cid->...acibd");
    ///
    /// let flat_inner: TtEinsum = "running: a i b, c i d, a c -> b d".parse().unwrap();
    /// assert_eq!(flat_inner.to_vanilla(), "...aib,...cid,...ac->...bd");
    /// ```
    pub fn to_vanilla(&self) -> String {
        let args: Vec<String> = self
            .args
            .iter()
            .map(|arg| format!("...{}", arg.flat().into_iter().collect::<String>()))
            .collect();
        format!(
            "{}->...{}",
            args.join(","),
            self.res.flat().into_iter().collect::<String>()
        )
    }

    pub fn from_raw(raw: parser::RawTtEinsum) -> Result<Self> {
        let kind = raw.kind.parse()?;
        let args = raw.args.into_iter().map(TtEinsumCore::new).collect();
        TtEinsum::new(kind, args, TtEinsumCore::new(raw.res))
    }
}

// `independent: a i b, c i d -> ac i bd` format
impl fmt::Display for TtEinsum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: ", self.kind)?;
        for (n, arg) in self.args.iter().enumerate() {
            if n > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", arg)?;
        }
        write!(f, " -> {}", self.res)
    }
}

impl FromStr for TtEinsum {
    type Err = Error;
    fn from_str(input: &str) -> Result<Self> {
        use nom::{combinator::all_consuming, Finish};
        match all_consuming(parser::tt_einsum)(input).finish() {
            Ok((_, raw)) => Self::from_raw(raw),
            Err(_) => Err(Error::InvalidSubscripts(input.to_string())),
        }
    }
}
