//! Booking domain: entities, value objects, availability arithmetic and the
//! ports the application layer drives.

pub mod availability;
pub mod booking;
pub mod gateway;
pub mod listing;
pub mod money;
pub mod notification;
pub mod payment;
pub mod payout;
pub mod ports;
pub mod transaction;
pub mod user;
pub mod webhook;
