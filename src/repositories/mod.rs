//! 数据访问层（Repository）

mod alert_repo;
mod delivery_repo;
mod history_store;
mod memory_store;
mod pg_store;
mod status_repo;

pub use alert_repo::AlertRepository;
pub use delivery_repo::DeliveryRepository;
pub use history_store::{CycleRecord, HistoryStore};
pub use memory_store::InMemoryHistoryStore;
pub use pg_store::PgHistoryStore;
pub use status_repo::StatusRepository;
