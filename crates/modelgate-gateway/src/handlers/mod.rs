//! Operational endpoints (no authorization required).

pub mod health;
