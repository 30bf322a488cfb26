//! Record module for resolved directives and the composition record

pub mod generator;
pub mod types;

pub use generator::CommandGenerator;
pub use types::{Composition, OutputMode, ResolvedDirective};
