//! More-or-less general-purpose utility functions.

pub mod first_if_only;
pub mod namers;

pub use self::first_if_only::first_if_only;
