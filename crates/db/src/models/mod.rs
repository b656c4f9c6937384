//! Row models mapping the SQLite tables onto core domain types.

pub mod access_log;
pub mod refresh_task;
pub mod session;
