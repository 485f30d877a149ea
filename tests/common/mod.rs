#![allow(dead_code)]

pub mod fixtures;
pub mod processors;
pub mod strategies;

pub use fixtures::*;
pub use processors::*;
pub use strategies::*;
