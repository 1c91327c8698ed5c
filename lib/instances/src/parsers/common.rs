use super::nom_prelude::*;
use std::num::ParseIntError;
use std::str::FromStr;

pub fn usize_<'a, E>(input: &'a str) -> IResult<&'a str, usize, E>
  where
    E: ParseError<&'a str> + error::FromExternalError<&'a str, ParseIntError>
{
  map_res(digit1, usize::from_str)(input)
}

pub fn u64_<'a, E>(input: &'a str) -> IResult<&'a str, u64, E>
  where
    E: ParseError<&'a str> + error::FromExternalError<&'a str, ParseIntError>
{
  map_res(digit1, u64::from_str)(input)
}

/// A run of non-whitespace characters.
pub fn token<'a, E>(input: &'a str) -> IResult<&'a str, &'a str, E>
  where
    E: ParseError<&'a str>
{
  is_not(" \t\r\n")(input)
}

/// `<keyword> <count>`, e.g. `nodes 120`.
pub fn header<'a, E>(keyword: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, usize, E>
  where
    E: ParseError<&'a str> + error::FromExternalError<&'a str, ParseIntError>
{
  preceded(pair(tag(keyword), space1), usize_)
}

/// Lines that carry data: trimmed, with blank lines and `#` comments removed.
/// Yields 1-based line numbers for error messages.
pub fn data_lines(input: &str) -> impl Iterator<Item=(usize, &str)> + '_ {
  input.lines()
    .enumerate()
    .map(|(k, l)| (k + 1, l.trim()))
    .filter(|(_, l)| !l.is_empty() && !l.starts_with('#'))
}

/// Run `parser` over the whole of `line`, turning a failure into an error naming the line.
pub fn parse_line<'a, O, F>(lineno: usize, line: &'a str, parser: F) -> crate::Result<O>
  where
    F: Parser<&'a str, O, error::Error<&'a str>>
{
  match all_consuming(parser)(line).finish() {
    Ok((_, out)) => Ok(out),
    Err(e) => Err(anyhow::anyhow!("line {}: {}", lineno, e)),
  }
}
