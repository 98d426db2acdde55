//! Error types for handoff
//!
//! 모든 에러를 중앙에서 관리

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// handoff 에러 타입
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // 설정 관련
    // ========================================================================
    #[error("Configuration error: {0}")]
    Config(String),

    // ========================================================================
    // 실행 컨텍스트 관련
    // ========================================================================
    #[error("Worker rejected job: {0}")]
    WorkerShutdown(String),

    #[error("Dispatcher error: {0}")]
    Dispatcher(String),

    // ========================================================================
    // Task 관련
    // ========================================================================
    #[error("Task error: {0}")]
    Task(String),

    #[error("Task panicked: {0}")]
    Panicked(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    // ========================================================================
    // 외부 에러 변환
    // ========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// panic payload 를 에러로 변환
    pub fn from_panic(payload: Box<dyn std::any::Any + Send>) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&'static str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Error::Panicked(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_payload_conversion() {
        let err = Error::from_panic(Box::new("boom"));
        assert!(matches!(err, Error::Panicked(ref m) if m == "boom"));

        let err = Error::from_panic(Box::new(String::from("owned boom")));
        assert_eq!(err.to_string(), "Task panicked: owned boom");

        let err = Error::from_panic(Box::new(42u32));
        assert!(matches!(err, Error::Panicked(ref m) if m == "non-string panic payload"));
    }
}
