#![cfg_attr(not(test), no_std)]

pub mod commands;
pub mod concentrator;
pub mod config;
pub mod dispatcher;
pub mod protocol;
pub mod serial;
