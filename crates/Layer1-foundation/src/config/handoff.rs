//! Handoff Config - 통합 설정
//!
//! 글로벌 설정과 프로젝트 설정을 병합하여 사용

use crate::storage::JsonStore;
use crate::Result;
use serde::{Deserialize, Serialize};

/// 설정 파일명
pub const HANDOFF_CONFIG_FILE: &str = "config.json";

/// Background worker 기본 nice 값 (background scheduling class)
pub const DEFAULT_BACKGROUND_NICE: i32 = 10;

// ============================================================================
// Handoff Config (통합)
// ============================================================================

/// handoff 통합 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HandoffConfig {
    /// 버전 (마이그레이션용)
    #[serde(default = "default_version")]
    pub version: u32,

    /// Task worker 설정
    #[serde(default)]
    pub task: TaskConfig,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            task: TaskConfig::default(),
        }
    }
}

impl HandoffConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// 저장소들에서 순서대로 병합 로드 (뒤쪽이 우선, 파일 없으면 건너뜀)
    ///
    /// 보통 `[글로벌, 프로젝트]` 순서로 전달
    pub fn load_from(stores: &[JsonStore]) -> Result<Self> {
        let mut config = Self::new();
        for store in stores {
            if let Some(layer) = store.load_optional::<HandoffConfig>(HANDOFF_CONFIG_FILE)? {
                config.merge(layer);
            }
        }
        Ok(config)
    }

    /// 다른 설정과 병합 (other가 우선)
    pub fn merge(&mut self, other: HandoffConfig) {
        self.version = self.version.max(other.version);
        self.task.merge(other.task);
    }

    pub fn task(mut self, task: TaskConfig) -> Self {
        self.task = task;
        self
    }
}

// ============================================================================
// Task Config
// ============================================================================

/// Task worker 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskConfig {
    /// Worker thread 이름
    #[serde(default = "default_worker_name")]
    pub worker_name: String,

    /// Background body 실행 시 적용할 nice 값 (None 이면 적용 안 함)
    #[serde(default = "default_background_nice")]
    pub background_nice: Option<i32>,

    /// phase 전환을 debug 대신 info 로 기록
    #[serde(default)]
    pub trace_phases: bool,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            worker_name: default_worker_name(),
            background_nice: default_background_nice(),
            trace_phases: false,
        }
    }
}

impl TaskConfig {
    pub fn worker_name(mut self, name: impl Into<String>) -> Self {
        self.worker_name = name.into();
        self
    }

    pub fn background_nice(mut self, nice: Option<i32>) -> Self {
        self.background_nice = nice;
        self
    }

    pub fn trace_phases(mut self, enabled: bool) -> Self {
        self.trace_phases = enabled;
        self
    }

    fn merge(&mut self, other: TaskConfig) {
        if other.worker_name != default_worker_name() {
            self.worker_name = other.worker_name;
        }
        if other.background_nice != default_background_nice() {
            self.background_nice = other.background_nice;
        }
        if other.trace_phases {
            self.trace_phases = true;
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn default_version() -> u32 {
    1
}

fn default_worker_name() -> String {
    "handoff-worker".to_string()
}

fn default_background_nice() -> Option<i32> {
    Some(DEFAULT_BACKGROUND_NICE)
}
