// src/handlers/mod.rs
pub mod ai;
pub mod appointments;
pub mod catalog;
pub mod chat;
pub mod cma;
pub mod idx;
pub mod payments;
