//! Parse einsum subscripts and tt-einsum literals
//!
//! These parsers are implemented using [nom](https://github.com/Geal/nom),
//! and corresponding EBNF-like schema are written in each document page.
//!

use crate::{label::Group, subscripts::*};
use nom::{
    branch::*, bytes::complete::*, character::complete::*, combinator::*, multi::*, sequence::*,
    IResult, Parser,
};

/// index = any alphabetic character, e.g. `i`, `K`, or `α`;
pub fn index(input: &str) -> IResult<&str, char> {
    satisfy(|c| c.is_alphabetic()).parse(input)
}

/// ellipsis = `...`
pub fn ellipsis(input: &str) -> IResult<&str, Label> {
    tag("...").map(|_| Label::Ellipsis).parse(input)
}

/// subscript = { [index] | [ellipsis] };
pub fn subscript(input: &str) -> IResult<&str, Subscript> {
    many0(alt((
        index.map(|c| Some(Label::Index(c))),
        ellipsis.map(Some),
        multispace1.map(|_| None),
    )))
    .map(|labels| Subscript(labels.into_iter().flatten().collect()))
    .parse(input)
}

/// Flat einsum subscripts, e.g. `...aib,...cid->...acibd`
#[derive(Debug, PartialEq, Eq)]
pub struct RawSubscripts {
    /// `...aib` and `...cid`
    pub inputs: Vec<Subscript>,
    /// `None` in implicit mode
    pub output: Option<Subscript>,
}

/// subscripts = [subscript] {`,` [subscript]} \[ `->` [subscript] \]
pub fn subscripts(input: &str) -> IResult<&str, RawSubscripts> {
    let (input, _head) = multispace0(input)?;
    let (input, inputs) = separated_list1(char(','), subscript)(input)?;
    let (input, output) = opt(tuple((multispace0, tag("->"), multispace0, subscript))
        .map(|(_space_pre, _arrow, _space_post, output)| output))(input)?;
    Ok((input, RawSubscripts { inputs, output }))
}

/// group = [index] { [index] };
pub fn group(input: &str) -> IResult<&str, Group> {
    many1(index).map(Group::new).parse(input)
}

/// core = [group] { space [group] };
pub fn core(input: &str) -> IResult<&str, Vec<Group>> {
    separated_list1(space1, group)(input)
}

/// tt-einsum literal before validation, e.g. `independent: a i b, c i d -> ac i bd`
#[derive(Debug, PartialEq, Eq)]
pub struct RawTtEinsum<'input> {
    /// The word before `:`, e.g. `independent`
    pub kind: &'input str,
    pub args: Vec<Vec<Group>>,
    pub res: Vec<Group>,
}

/// tt_einsum = kind `:` [core] {`,` [core]} `->` [core]
pub fn tt_einsum(input: &str) -> IResult<&str, RawTtEinsum> {
    let (input, _head) = multispace0(input)?;
    let (input, kind) = alpha1(input)?;
    let (input, _colon) = tuple((multispace0, char(':'), multispace0))(input)?;
    let (input, args) =
        separated_list1(tuple((multispace0, char(','), multispace0)), core)(input)?;
    let (input, _arrow) = tuple((multispace0, tag("->"), multispace0))(input)?;
    let (input, res) = core(input)?;
    let (input, _tail) = multispace0(input)?;
    Ok((input, RawTtEinsum { kind, args, res }))
}

#[cfg(test)]
mod tests {

    use super::*;
    use nom::Finish;

    fn labels(s: &str) -> Subscript {
        Subscript(
            s.chars()
                .map(|c| {
                    if c == '.' {
                        Label::Ellipsis
                    } else {
                        Label::Index(c)
                    }
                })
                .collect(),
        )
    }

    #[test]
    fn test_core_subscript() {
        let ans = ("", labels(".aib"));
        assert_eq!(subscript("...aib").finish().unwrap(), ans);
        assert_eq!(subscript("... a i b").finish().unwrap(), ans);
        assert_eq!(subscript("...ai b").finish().unwrap(), ans);

        // batch dimensions are only allowed by `...`
        let (rest, out) = subscript("...acibd,").finish().unwrap();
        assert_eq!(out, labels(".acibd"));
        assert_eq!(rest, ",");

        let (rest, out) = subscript("...αiβ").finish().unwrap();
        assert_eq!(out, labels(".αiβ"));
        assert_eq!(rest, "");
    }

    #[test]
    fn test_vanilla() {
        fn test(input: &str) {
            dbg!(input);
            let (_, op) = subscripts(input).finish().unwrap();
            assert_eq!(
                op,
                RawSubscripts {
                    inputs: vec![labels(".aib"), labels(".cid")],
                    output: Some(labels(".acibd")),
                }
            );
        }
        test("...aib,...cid->...acibd");
        test(" ...aib, ...cid -> ...acibd");
        test("...a i b,...c i d->...ac i bd");

        // implicit mode
        let (_, op) = subscripts("...aib,...cid").finish().unwrap();
        assert_eq!(op.output, None);

        // running tt-einsum contracts the accumulator
        let (_, op) = subscripts("...aib,...cid,...ac->...bd").finish().unwrap();
        assert_eq!(op.inputs.len(), 3);
        assert_eq!(op.inputs[2], labels(".ac"));
        assert_eq!(op.output, Some(labels(".bd")));
    }

    #[test]
    fn test_tt_einsum() {
        fn test(input: &str) {
            dbg!(input);
            let (rest, raw) = tt_einsum(input).finish().unwrap();
            assert_eq!(rest, "");
            assert_eq!(
                raw,
                RawTtEinsum {
                    kind: "independent",
                    args: vec![
                        vec![Group::from("a"), Group::from("i"), Group::from("b")],
                        vec![Group::from("c"), Group::from("i"), Group::from("d")],
                    ],
                    res: vec![Group::from("ac"), Group::from("i"), Group::from("bd")],
                }
            );
        }
        test("independent: a i b, c i d -> ac i bd");
        test("independent:a i b,c i d->ac i bd");
        test("  independent : a i b , c i d -> ac i bd  ");
        test("independent: a  i b,\n c i d -> ac i bd");
    }

    #[test]
    fn test_tt_einsum_running() {
        let (rest, raw) = tt_einsum("running: a i b, c i d, a c -> b d")
            .finish()
            .unwrap();
        assert_eq!(rest, "");
        assert_eq!(raw.kind, "running");
        assert_eq!(raw.args.len(), 3);
        assert_eq!(raw.args[2], vec![Group::from("a"), Group::from("c")]);
        assert_eq!(raw.res, vec![Group::from("b"), Group::from("d")]);
    }
}
