//! Core of the Liman terminal platform: exchange rates, service pricing and the SGK
//! compliance pipeline.

pub mod config;
pub mod deadline;
pub mod error;
pub mod fx;
pub mod memory;
pub mod money;
pub mod pricing;
pub mod repository;
pub mod sgk;
pub mod sync;
pub mod telemetry;
