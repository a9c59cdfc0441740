//! Infrastructure adapters: credential directories, recipient lists and
//! file-backed delivery logs.

pub mod credentials;
pub mod file_log;
pub mod job_list;

pub use credentials::load_credential_sources;
pub use file_log::FileDeliveryLog;
pub use job_list::{
    load_job_list, parse_job_list, ContentResolver, DirContentResolver, JobList,
    MemoryContentResolver,
};
