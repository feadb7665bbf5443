#![forbid(unsafe_code)]

pub mod countdown;
pub mod guard;
pub mod ledger;
pub mod model;
pub mod scoring;
pub mod time;

pub use time::Clock;
