//! Search pipeline: quota gate, query lifecycle, content reconciliation,
//! background execution, and the read-side rollups built on top of them.
//!
//! Persistence goes through [`SearchStore`]. [`PgSearchStore`] backs it with
//! Postgres; [`MemoryStore`] keeps everything in process.

pub mod accounts;
pub mod aggregate;
pub mod error;
pub mod memory;
pub mod model;
pub mod orchestrator;
pub mod pg;
pub mod quota;
pub mod reconcile;
pub mod store;
pub mod worker;

pub use aggregate::{chart, dashboard, ChartData, ChartPoint, ChartTotals, DashboardStats};
pub use error::{SearchError, StoreError};
pub use memory::MemoryStore;
pub use model::{
    Content, NewSearch, PlatformCount, QuotaPeriod, SearchQuery, SearchResult, User,
    SEARCH_FAILED_MESSAGE,
};
pub use orchestrator::SearchOrchestrator;
pub use pg::PgSearchStore;
pub use quota::{next_period_start, QuotaLedger, QuotaView};
pub use reconcile::reconcile;
pub use store::SearchStore;
pub use worker::{SearchQueue, SearchWorker};
