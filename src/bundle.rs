pub mod atlas;
pub mod container;
pub mod json;
pub mod timeline;
