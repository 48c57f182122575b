//! Impls - 実装（開発用・テスト用）
//!
//! このモジュールには ports の実装を含めます。
//!
//! # 含まれる実装
//! - **InMemoryRecordStore**: 開発用・テスト用の RecordStore
//!
//! # 本番用実装
//! 本番用の relational store 実装は別クレートに配置します。

pub mod inmem_store;

// 主要な型を再エクスポート
pub use self::inmem_store::{InMemoryRecordStore, WriteCounts};
