//! CLI command implementations.

pub mod inspect;
pub mod path;
pub mod publish;
pub mod version;
