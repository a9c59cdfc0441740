//! Unit tests for individual components

mod builders_test;
mod config_test;
mod credentials_test;
mod file_log_test;
mod job_list_test;
mod runtime_test;
mod util_test;
