/// One roster line exactly as it appeared in the file.
#[derive(Debug, Clone, PartialEq)]
pub struct RawStudent {
  pub id: String,
  pub name: String,
  pub lat: f64,
  pub lon: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RawRoster {
  pub depot: (f64, f64),
  pub students: Vec<RawStudent>,
}
