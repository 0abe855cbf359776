pub mod api;
pub mod audit;
pub mod command;
pub mod config;
pub mod control;
pub mod daylight;
pub mod error;
pub mod lights;
pub mod member;
pub mod policy;
pub mod probe;
pub mod state;
pub mod tracker;
