// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod config;
pub mod errors;
pub mod store;
pub mod evaluator;
pub mod snapshot;
pub mod ledger;
pub mod scanner;
pub mod engine;
pub mod telemetry;

pub use engine::Coprocessor;
pub use errors::EngineError;
