//! Integration tests for the promptline job pipeline

mod config_integration;
mod scheduler_pipeline;
mod test_utils;
mod title_generation;
