use std::path::Path;
use anyhow::Context;
use crate::Result;
use crate::raw::road::*;
use super::{
  ParseInstance,
  nom_prelude::*,
};

/// Road network instance file:
///
/// ```text
/// nodes <n>
/// <node id> <lat> <lon>        (n lines)
/// edges <m>
/// <from> <to> <metres|-> <0|1> (m lines, `-` = haversine length, 1 = one-way)
/// ```
#[derive(Debug, Copy, Clone)]
pub struct RoadGraphFmt<P>(pub P);

impl<P: AsRef<Path>> ParseInstance<RoadGraphFmt<P>> for RawRoadGraph {
  fn parse(input: RoadGraphFmt<P>) -> Result<Self> {
    let path = input.0.as_ref();
    let data = std::fs::read_to_string(path)?;
    parsers::road_graph(&data).with_context(|| format!("failed to parse road graph {:?}", path))
  }
}

pub(crate) mod parsers {
  use super::*;
  use crate::parsers::common::*;

  fn node_line<'a, E>(input: &'a str) -> IResult<&'a str, (u64, f64, f64), E>
    where
      E: ParseError<&'a str> + FromExternalError<&'a str, ParseIntError>
  {
    tuple((
      u64_,
      preceded(space1, double),
      preceded(space1, double),
    ))(input)
  }

  fn edge_length<'a, E>(input: &'a str) -> IResult<&'a str, Option<f64>, E>
    where
      E: ParseError<&'a str>
  {
    alt((
      value(None, char('-')),
      map(double, Some),
    ))(input)
  }

  fn edge_line<'a, E>(input: &'a str) -> IResult<&'a str, RawEdge, E>
    where
      E: ParseError<&'a str> + FromExternalError<&'a str, ParseIntError>
  {
    let (input, (from, to, length, oneway)) = tuple((
      u64_,
      preceded(space1, u64_),
      preceded(space1, edge_length),
      preceded(space1, alt((value(false, char('0')), value(true, char('1'))))),
    ))(input)?;
    Ok((input, RawEdge { from, to, length, oneway }))
  }

  pub fn road_graph(input: &str) -> Result<RawRoadGraph> {
    let mut lines = data_lines(input);
    let mut next_line = |what: &str| {
      lines.next().ok_or_else(|| anyhow::anyhow!("unexpected end of file, expected {}", what))
    };

    let (lineno, line) = next_line("`nodes <n>`")?;
    let num_nodes = parse_line(lineno, line, header("nodes"))?;
    let mut nodes = Vec::with_capacity(num_nodes);
    for _ in 0..num_nodes {
      let (lineno, line) = next_line("a node line")?;
      nodes.push(parse_line(lineno, line, node_line)?);
    }

    let (lineno, line) = next_line("`edges <m>`")?;
    let num_edges = parse_line(lineno, line, header("edges"))?;
    let mut edges = Vec::with_capacity(num_edges);
    for _ in 0..num_edges {
      let (lineno, line) = next_line("an edge line")?;
      edges.push(parse_line(lineno, line, edge_line)?);
    }

    if let Some((lineno, _)) = lines.next() {
      anyhow::bail!("line {}: trailing data after {} edges", lineno, num_edges);
    }

    Ok(RawRoadGraph { nodes, edges })
  }
}
