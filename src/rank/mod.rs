mod scoring;

pub use scoring::{score_post, ScoreBreakdown, ScoreResult};
