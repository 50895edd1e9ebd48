//! Request handlers

pub mod fetchdata;
pub mod health;
pub mod predict;
