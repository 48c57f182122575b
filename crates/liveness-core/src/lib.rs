//! liveness-core
//!
//! Turns a high-frequency stream of "task queue / worker seen" observations
//! into a low-frequency stream of durable writes, while keeping expiration,
//! last-active time and recent task history accurate within a bounded window.
//!
//! # モジュール構成
//! - **domain**: ドメインモデル（ids, task_queue, worker, errors）
//! - **ports**: 抽象化レイヤー（RecordStore, Clock）
//! - **app**: アプリケーションロジック（debounce, upsert, recency, expiry, worker_info）
//! - **impls**: 実装（InMemoryRecordStore など開発用）

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

pub use app::{WorkerInfo, WorkerInfoConfig};
