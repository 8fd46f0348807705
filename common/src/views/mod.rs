//! Output views for the various functions within Lucid.

mod certificate;
pub use certificate::*;
