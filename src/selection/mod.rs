pub mod objects;
pub mod overlap;
pub mod registry;
