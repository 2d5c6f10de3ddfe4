pub mod accumulator;
pub mod axis;
pub mod histogram;
