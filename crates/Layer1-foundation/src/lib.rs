//! # handoff-foundation
//!
//! Foundation layer for handoff:
//! - Error: 중앙 에러 타입 (`Error`, `Result`)
//! - Config: 통합 설정 (HandoffConfig, TaskConfig)
//! - Storage: JsonStore (설정 파일 읽기)
//! - Logging: tracing subscriber 초기화

pub mod config;
pub mod error;
pub mod logging;
pub mod storage;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Config (설정)
// ============================================================================
pub use config::{HandoffConfig, TaskConfig, DEFAULT_BACKGROUND_NICE, HANDOFF_CONFIG_FILE};

// ============================================================================
// Storage (저장소)
// ============================================================================
pub use storage::JsonStore;
