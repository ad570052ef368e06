//! Infrastructure Layer - persistence adapters

pub mod postgres;
