pub mod aggregators;
pub mod config;
pub mod error;
pub mod features;
pub mod model;
pub mod normalizer;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod staging;
pub mod validator;
