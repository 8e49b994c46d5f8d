pub mod actions;
pub mod agents;
pub mod health;
pub mod lifecycle;
pub mod profiles;
