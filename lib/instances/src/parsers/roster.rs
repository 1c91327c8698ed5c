use std::path::Path;
use anyhow::Context;
use crate::Result;
use crate::raw::roster::*;
use super::{
  ParseInstance,
  nom_prelude::*,
};

/// Roster instance file: a `depot <lat> <lon>` line followed by one
/// `<id> <lat> <lon> <name...>` line per student.
#[derive(Debug, Copy, Clone)]
pub struct RosterFmt<P>(pub P);

impl<P: AsRef<Path>> ParseInstance<RosterFmt<P>> for RawRoster {
  fn parse(input: RosterFmt<P>) -> Result<Self> {
    let path = input.0.as_ref();
    let data = std::fs::read_to_string(path)?;
    parsers::roster(&data).with_context(|| format!("failed to parse roster {:?}", path))
  }
}

pub(crate) mod parsers {
  use super::*;
  use crate::parsers::common::*;

  fn coord<'a, E>(input: &'a str) -> IResult<&'a str, (f64, f64), E>
    where
      E: ParseError<&'a str>
  {
    separated_pair(double, space1, double)(input)
  }

  fn depot_line<'a, E>(input: &'a str) -> IResult<&'a str, (f64, f64), E>
    where
      E: ParseError<&'a str>
  {
    preceded(pair(tag("depot"), space1), coord)(input)
  }

  fn student_line<'a, E>(input: &'a str) -> IResult<&'a str, RawStudent, E>
    where
      E: ParseError<&'a str>
  {
    let (input, id) = token(input)?;
    let (input, (lat, lon)) = preceded(space1, coord)(input)?;
    let (input, name) = opt(preceded(space1, rest))(input)?;
    Ok((input, RawStudent {
      id: id.to_string(),
      name: name.map(|n: &str| n.trim().to_string()).unwrap_or_default(),
      lat,
      lon,
    }))
  }

  pub fn roster(input: &str) -> Result<RawRoster> {
    let mut lines = data_lines(input);
    let depot = match lines.next() {
      Some((lineno, line)) => parse_line(lineno, line, depot_line)?,
      None => anyhow::bail!("empty roster: expected a `depot <lat> <lon>` line"),
    };

    let students = lines
      .map(|(lineno, line)| parse_line(lineno, line, student_line))
      .collect::<Result<Vec<_>>>()?;

    Ok(RawRoster { depot, students })
  }
}
