// Scoring: turns public engagement counters into rankings.

pub mod engagement;
