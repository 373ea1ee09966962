pub mod config;
pub mod error;
pub mod scan;
pub mod selection;
pub mod web;
