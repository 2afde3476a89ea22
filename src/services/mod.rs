// Services module - membership derivation and the booking gate

pub mod booking;
pub mod membership;
pub mod plan_catalog;
pub mod schedule;
