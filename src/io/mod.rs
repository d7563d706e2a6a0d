//! Tab-separated input and output.

mod tsv;

pub use tsv::{read_uniques, render_variants, write_error_model, write_uniques, write_variants};
