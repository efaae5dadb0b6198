//! More-or-less general-purpose utility functions.

pub mod bits;
pub mod cur;
#[macro_use]
pub mod fields;
pub mod view;
