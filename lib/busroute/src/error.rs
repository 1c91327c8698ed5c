use std::fmt;
use crate::data::school::StopId;

/// Why a roster row was rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum IssueKind {
  EmptyId,
  DuplicateId,
  NonFiniteCoordinate,
  CoordinateOutOfRange,
}

impl fmt::Display for IssueKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let s = match self {
      IssueKind::EmptyId => "empty student id",
      IssueKind::DuplicateId => "duplicate student id",
      IssueKind::NonFiniteCoordinate => "non-finite home coordinate",
      IssueKind::CoordinateOutOfRange => "home coordinate out of range",
    };
    f.write_str(s)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputIssue {
  /// Position of the row in the roster as given.
  pub row: usize,
  pub id: String,
  pub kind: IssueKind,
}

impl fmt::Display for InputIssue {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "row {} ({:?}): {}", self.row, self.id, self.kind)
  }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
  InvalidInput(Vec<InputIssue>),
  InvalidConfig(String),
  EmptyRoadGraph,
  NoFeasiblePlan { theoretical_min: u32, max_fleet: u32 },
}

impl fmt::Display for Error {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Error::InvalidInput(issues) => {
        write!(f, "roster rejected with {} issue(s)", issues.len())?;
        for i in issues {
          write!(f, "\n  {}", i)?;
        }
        Ok(())
      }
      Error::InvalidConfig(msg) => write!(f, "invalid configuration: {}", msg),
      Error::EmptyRoadGraph => f.write_str("road graph has no nodes to snap stops to"),
      Error::NoFeasiblePlan { theoretical_min, max_fleet } =>
        write!(f, "no feasible plan found for fleet sizes {}..={}", theoretical_min, max_fleet),
    }
  }
}

impl std::error::Error for Error {}

/// Non-fatal diagnostics carried alongside a plan.
#[derive(Debug, Clone, PartialEq)]
pub enum Warning {
  DroppedRow(InputIssue),
  FleetTooSmall { theoretical_min: u32, max_fleet: u32 },
  RepairBoundReached { passes: usize, singletons: usize },
  UnreachableStops { pairs: usize },
  MissingStudent { stop: StopId, student: String },
}

impl fmt::Display for Warning {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Warning::DroppedRow(issue) => write!(f, "dropped {}", issue),
      Warning::FleetTooSmall { theoretical_min, max_fleet } =>
        write!(f, "at least {} buses are needed but only {} are available; routes will be overloaded",
               theoretical_min, max_fleet),
      Warning::RepairBoundReached { passes, singletons } =>
        write!(f, "stop repair stopped after {} passes, {} students given their own stop", passes, singletons),
      Warning::UnreachableStops { pairs } =>
        write!(f, "{} stop pairs are not connected by the road graph", pairs),
      Warning::MissingStudent { stop, student } =>
        write!(f, "student {:?} at stop {} is not in the roster", student, stop),
    }
  }
}
