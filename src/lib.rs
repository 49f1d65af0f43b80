// src/lib.rs
pub mod app;
pub mod config;
pub mod library;
pub mod web;

#[cfg(test)]
mod test_support;
