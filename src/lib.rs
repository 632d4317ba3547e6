#![forbid(unsafe_code)]

pub mod batch;
pub mod cli;
pub mod commands;
pub mod config;
pub mod context;
pub mod error;
pub mod fetch;
pub mod formats;
pub mod glossary;
pub mod hosts;
pub mod logging;
pub mod openai;
pub mod page_table;
pub mod pipeline;
pub mod retry;
pub mod store;
pub mod translate;
