pub mod plan;
pub mod representations;
