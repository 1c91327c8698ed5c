use tracing::*;

use crate::*;
use crate::config::InputPolicy;
use crate::data::school::RosterEntry;

/// Checks every roster row. Under [`InputPolicy::Strict`] any issue rejects the whole
/// roster; under [`InputPolicy::Lenient`] offending rows are dropped and reported.
#[instrument(level="debug", skip(roster), fields(rows=roster.len()))]
pub fn validate_roster(roster: &[RosterEntry], policy: InputPolicy) -> Result<(Vec<RosterEntry>, Vec<Warning>), Error> {
  let mut seen = Set::default();
  let mut issues = Vec::new();
  let mut kept = Vec::with_capacity(roster.len());

  for (row, entry) in roster.iter().enumerate() {
    let kind = if entry.id.trim().is_empty() {
      Some(IssueKind::EmptyId)
    } else if !entry.home.is_finite() {
      Some(IssueKind::NonFiniteCoordinate)
    } else if !entry.home.in_range() {
      Some(IssueKind::CoordinateOutOfRange)
    } else if !seen.insert(entry.id.as_str()) {
      // only rows that are otherwise valid claim their id
      Some(IssueKind::DuplicateId)
    } else {
      None
    };

    match kind {
      Some(kind) => issues.push(InputIssue { row, id: entry.id.clone(), kind }),
      None => kept.push(entry.clone()),
    }
  }

  if issues.is_empty() {
    return Ok((kept, Vec::new()))
  }

  match policy {
    InputPolicy::Strict => {
      error!(issues=issues.len(), "roster rejected");
      Err(Error::InvalidInput(issues))
    }
    InputPolicy::Lenient => {
      for i in &issues {
        warn!(row=i.row, id=%i.id, reason=%i.kind, "dropping roster row");
      }
      Ok((kept, issues.into_iter().map(Warning::DroppedRow).collect()))
    }
  }
}
