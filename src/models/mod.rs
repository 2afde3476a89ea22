// Models module - ledger record collections

pub mod class_session;
pub mod client;
pub mod payment;
pub mod reservation;

pub use class_session::ClassSession;
pub use client::Client;
pub use payment::Payment;
pub use reservation::Reservation;
