//! 状态层错误类型定义

use thiserror::Error;

/// 状态层错误类型
#[derive(Error, Debug)]
pub enum StateError {
    /// 存储的值无法解码为请求的类型
    #[error("Cannot decode `{key}` in section {section}: {source}")]
    Decode {
        section: String,
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::StateError;

    #[test]
    fn test_decode_error_display() {
        let source = serde_json::from_str::<u32>("\"abc\"").unwrap_err();
        let err = StateError::Decode {
            section: "recipe".to_string(),
            key: "mode".to_string(),
            source,
        };
        let msg = err.to_string();
        assert!(msg.contains("`mode`") && msg.contains("recipe"), "{}", msg);
    }
}
