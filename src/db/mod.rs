mod repository;
mod schema;

pub use repository::{CandidatePost, PostFilter, RankedPost, Repository};
