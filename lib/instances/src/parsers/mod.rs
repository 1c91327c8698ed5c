mod roster;
pub use roster::RosterFmt;

mod road;
pub use road::RoadGraphFmt;


mod nom_prelude {
  pub use nom::{
    IResult, Parser,
    error::{
      self,
      ParseError,
      FromExternalError,
      context,
    },
    sequence::*,
    multi::*,
    combinator::*,
    character::complete::*,
    bytes::complete::{tag, is_not},
    number::complete::double,
    Finish,
    branch::alt,
  };
  pub use std::str::FromStr;
  pub use std::num::{ParseIntError, ParseFloatError};
}

mod common;

pub trait ParseInstance<Fmt>: Sized {
  fn parse(inputs: Fmt) -> crate::Result<Self>;
}
