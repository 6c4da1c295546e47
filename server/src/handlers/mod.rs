//! Request handlers for the profile table.

mod profiles;

pub use profiles::*;
