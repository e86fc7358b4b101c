//! Ports - 抽象化レイヤー
//!
//! 各 trait は外部システム（Discord API, 時計, ID 生成）や状態の正本への
//! インターフェースを提供し、実装の詳細を隠蔽します。

pub mod clock;
pub mod id_generator;
pub mod task_store;
pub mod upstream;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::task_store::{TaskCounts, TaskStore};
pub use self::upstream::{CommandSender, GenerateCommand, MessageSource, SendReceipt};
