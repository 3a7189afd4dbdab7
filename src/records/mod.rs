//! CSV input and output around the pipeline.
//!
//! [`BatchReader`] turns input files into fixed-size [`Batch`]es of
//! records; [`StationWriter`] writes the final per-key records back out.

mod sink;
mod source;

pub use sink::StationWriter;
pub use source::{Batch, BatchReader};
