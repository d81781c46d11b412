#![allow(clippy::doc_markdown)]
#![doc = include_str!("../README.md")]

pub mod appliance;
pub mod charger;
pub mod clock;
pub mod config;
pub mod control;
pub mod error;
pub mod event;
pub mod ops;
pub mod prelude;
pub mod quantity;
pub mod running_time;
pub mod schedule;
pub mod simulation;
pub mod tables;
