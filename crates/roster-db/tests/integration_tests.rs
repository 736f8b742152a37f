//! PostgreSQL integration tests. Each test starts its own container.

mod integration;
