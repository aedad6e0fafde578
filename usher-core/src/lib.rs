pub mod catalog;
pub mod events;
pub mod policy;
pub mod reservation;
pub mod store;

pub use reservation::{Reservation, SeatKey};
