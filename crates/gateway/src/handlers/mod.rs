//! API handlers module

pub mod chat;
pub mod health;
pub mod offers;
pub mod search;
pub mod submissions;
