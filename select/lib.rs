#![deny(dead_code)]
#![deny(unused_imports)]

pub mod forward;
pub mod intercross;
pub mod ols;
