//! Repository layer: one unit struct per table, each method a single query.

pub mod access_log_repo;
pub mod credential_repo;
pub mod refresh_task_repo;
pub mod session_repo;

pub use access_log_repo::AccessLogRepo;
pub use credential_repo::CredentialRepo;
pub use refresh_task_repo::RefreshTaskRepo;
pub use session_repo::SessionRepo;
