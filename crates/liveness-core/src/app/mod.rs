//! App - アプリケーション層
//!
//! このモジュールは、ports を組み合わせてアプリケーションロジックを実装します。
//!
//! # 主要コンポーネント
//! - **DebounceGate**: observation ごとの書き込み間隔を制御
//! - **UpsertEngine**: get → update / create（conflict は吸収）
//! - **RecencyTracker**: worker の直近タスク履歴
//! - **ExpirySweeper / ExpiryLoop**: 期限切れ rows の回収
//! - **WorkerInfo**: API 層向けの表面

pub mod config;
pub mod debounce;
pub mod expiry;
pub mod recency;
pub mod upsert;
pub mod worker_info;

// 主要な型を再エクスポート
pub use self::config::{Timing, WorkerInfoConfig};
pub use self::debounce::{DebounceGate, ObservationKey, PersistPermit};
pub use self::expiry::{ExpiryLoop, ExpiryReport, ExpirySweeper};
pub use self::recency::RecencyTracker;
pub use self::upsert::{RefreshPolicy, TaskQueueFields, UpsertEngine, WorkerFields};
pub use self::worker_info::WorkerInfo;
