// hatewatch: collect, clean and label social media posts for cyberbullying research
//
// This is the library root. Each module corresponds to a subsystem of the
// scrape → clean → label pipeline.

pub mod classifier;
pub mod config;
pub mod db;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod quality;
pub mod report;
pub mod sources;
pub mod status;
