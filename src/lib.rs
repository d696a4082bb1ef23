pub mod config;
pub mod constraints;
pub mod descriptor;
pub mod fetch;
pub mod humanize;
pub mod observability;
pub mod scheduler;
pub mod sink;
pub mod storage;
pub mod worker;
