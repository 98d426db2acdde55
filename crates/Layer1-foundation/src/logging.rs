//! Logging - tracing subscriber 초기화
//!
//! `RUST_LOG` 이 설정되어 있으면 우선 사용하고, 없으면 전달된 레벨을 사용

use crate::{Error, Result};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// 글로벌 subscriber 설치
///
/// 이미 설치되어 있으면 `Error::Config` 를 반환
pub fn init(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {}", e)))
}

/// 테스트용 초기화 (중복 호출 허용, 출력은 test writer 로)
pub fn init_for_tests() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_test_writer(),
        )
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_reported() {
        init_for_tests();
        assert!(matches!(init("info"), Err(Error::Config(_))));
    }
}
