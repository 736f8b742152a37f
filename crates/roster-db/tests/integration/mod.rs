pub mod common;

mod agent_tests;
mod catalog_tests;
mod job_tests;
mod match_tests;
