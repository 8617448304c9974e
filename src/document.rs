pub mod builder;
pub mod model;
pub mod writer;
