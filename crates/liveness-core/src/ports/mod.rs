//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各 trait は外部システム（relational store, 時刻）への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod record_store;

// 主要な trait を再エクスポート
pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::record_store::RecordStore;
