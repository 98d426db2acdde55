//! Config - 통합 설정 관리
//!
//! - `handoff.rs` - HandoffConfig 통합 설정 (worker 설정, 레이어 병합)

mod handoff;

pub use handoff::{HandoffConfig, TaskConfig, DEFAULT_BACKGROUND_NICE, HANDOFF_CONFIG_FILE};
