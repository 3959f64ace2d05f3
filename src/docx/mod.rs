pub mod package;
pub mod substitute;
pub mod xml;
