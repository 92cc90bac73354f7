pub mod errors;
pub mod matching;
pub mod pipeline;
pub mod scoring;
pub mod table;
pub mod utils;
