// src/sources/providers/mod.rs
pub mod jobicy;
pub mod remoteboard;
pub mod usajobs;
