//! keeper-core
//!
//! Delivery guarantees for batch sources that cannot take a message back.
//!
//! # モジュール構成
//! - **domain**: Batch / Part, partial-failure errors, sort-group tracking, ids
//! - **ports**: `AsyncSource` と `Acknowledger`（source 実装が満たす抽象）
//! - **queue**: resend queue, entries, backoff policy
//! - **preserver**: `AsyncPreserver` 本体（ack wrapper, drain）
//! - **worker**: read → process → ack を回す consumer loop
//! - **impls**: `InMemorySource`（開発・テスト用）
//! - **config / observability / error**: 設定、統計・ログ初期化、エラー型
//!
//! # Usage
//! ```ignore
//! let source = AsyncPreserver::with_config(my_source, PreserverConfig::from_path("keeper.json")?);
//! let consumer = ConsumerHandle::spawn(Arc::new(source), processor, ConsumerConfig::default());
//! let report = consumer.join().await?;
//! ```

pub mod config;
pub mod domain;
pub mod error;
pub mod impls;
pub mod observability;
pub mod ports;
pub mod preserver;
pub mod queue;
pub mod worker;

pub use config::{ConfigError, PreserverConfig};
pub use domain::{Batch, BatchError, Part, ProcessingError};
pub use error::{AckError, BoxError, ReadError};
pub use observability::PreserverStats;
pub use ports::{AckHandle, Acknowledger, AsyncSource};
pub use preserver::AsyncPreserver;
pub use queue::BackoffPolicy;
pub use worker::{BatchProcessor, ConsumerConfig, ConsumerHandle, ConsumerReport};
