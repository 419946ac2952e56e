//! Wire-format and in-memory data types: Morton keys, the domain box, bodies and cells.

pub mod body;
pub mod cell;
pub mod domain;
pub mod morton;
