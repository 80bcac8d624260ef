pub mod ai;
pub mod appointment;
pub mod auth;
pub mod catalog;
pub mod chat;
pub mod listing;
