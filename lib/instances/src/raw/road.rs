#[derive(Debug, Clone, PartialEq)]
pub struct RawEdge {
  pub from: u64,
  pub to: u64,
  /// Length in metres; `None` when the file asks for it to be computed from coordinates.
  pub length: Option<f64>,
  pub oneway: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRoadGraph {
  /// `(external id, lat, lon)`
  pub nodes: Vec<(u64, f64, f64)>,
  pub edges: Vec<RawEdge>,
}
