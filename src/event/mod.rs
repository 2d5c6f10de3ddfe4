pub mod collections;
pub mod frame;
pub mod ragged;
