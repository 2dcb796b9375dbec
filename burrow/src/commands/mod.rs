pub mod check;
mod common;
pub mod run;
pub mod setup;
