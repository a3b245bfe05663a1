pub mod normalize;
pub mod operation;
pub mod selection_set;
pub mod value;
