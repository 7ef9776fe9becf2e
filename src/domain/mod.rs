//! Domain layer: value objects, entities and the ports the application layer
//! depends on.

pub mod account;
pub mod money;
pub mod owner;
pub mod ports;
