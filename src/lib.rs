#![allow(async_fn_in_trait)]
pub mod config;
pub mod dataspace;
pub mod download;
pub mod error;
pub mod orchestrator;
pub mod product;
pub mod source;
