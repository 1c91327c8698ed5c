use std::path::Path;
use anyhow::Result;
use instances::dataset::{school as dset, Dataset, IdxNameMap};

pub mod school;

pub fn get_school_instance_by_name(name : &str) -> Result<school::SchoolInstance> {
  get_school_instance_by_index(dset::DSET.name_to_index(name)?)
}


pub fn get_school_instance_by_index(idx : usize) -> Result<school::SchoolInstance> {
    dset::DSET.load_instance(idx)
}

/// Instance from a roster file and a road graph file outside the dataset directory.
pub fn get_school_instance_from_files(roster: impl AsRef<Path>, graph: impl AsRef<Path>) -> Result<school::SchoolInstance> {
  dset::load_files(roster, graph)
}
