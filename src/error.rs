//! 统一错误处理模块
//!
//! 提供区块翻译流水线的统一错误类型定义和处理机制

// 标准库导入
use std::fmt;

// 第三方crate导入
use anyhow::Error as AnyhowError;

/// 区块翻译统一错误类型
///
/// 错误按作用域区分：配置错误对整篇文档致命；服务商错误只影响产生它的单元；
/// 数量不匹配会中止回填并保留原文；结构解析错误会退化为单个片段处理。
#[derive(Debug)]
pub enum TranslationError {
    /// 配置相关错误（缺少凭据、参数非法等），在任何翻译调用之前抛出
    Configuration {
        /// 配置项名称
        field: String,
        /// 错误原因
        reason: String,
    },

    /// 翻译服务返回失败（仅影响当前单元）
    Provider {
        /// 服务商名称
        provider: String,
        /// 错误消息
        message: String,
        /// HTTP状态码（如果适用）
        status_code: Option<u16>,
    },

    /// 网络请求相关错误
    Network {
        /// 错误消息
        message: String,
        /// HTTP状态码（如果适用）
        status_code: Option<u16>,
    },

    /// 回填时译文单元数量与提取片段数量不一致
    Mismatch {
        /// 提取得到的片段数量
        expected: usize,
        /// 实际提供的单元数量
        actual: usize,
        /// 详细说明
        details: String,
    },

    /// 区块结构解析失败
    StructuralParse {
        /// 具体错误信息
        details: String,
    },

    /// 文件操作相关错误
    FileOperation {
        /// 文件路径
        path: String,
        /// 操作类型（读取、写入、创建等）
        operation: String,
        /// 底层错误信息
        source: String,
    },

    /// 输入验证错误
    InputValidation {
        /// 输入值
        input: String,
        /// 验证失败原因
        reason: String,
    },

    /// 内部处理错误（包装anyhow::Error）
    Internal {
        /// 包装的错误
        source: AnyhowError,
    },
}

impl TranslationError {
    /// 是否为文档级致命错误
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TranslationError::Configuration { .. } | TranslationError::InputValidation { .. }
        )
    }

    /// 错误类别的简短名称，用于调试轨迹
    pub fn kind(&self) -> &'static str {
        match self {
            TranslationError::Configuration { .. } => "ConfigurationError",
            TranslationError::Provider { .. } => "ProviderError",
            TranslationError::Network { .. } => "NetworkError",
            TranslationError::Mismatch { .. } => "MismatchError",
            TranslationError::StructuralParse { .. } => "StructuralParseError",
            TranslationError::FileOperation { .. } => "FileOperationError",
            TranslationError::InputValidation { .. } => "InputValidationError",
            TranslationError::Internal { .. } => "InternalError",
        }
    }
}

impl fmt::Display for TranslationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationError::Configuration { field, reason } => {
                write!(f, "配置错误 [{}]: {}", field, reason)
            }
            TranslationError::Provider {
                provider,
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "翻译服务错误 [{}] [{}]: {}", provider, code, message)
                } else {
                    write!(f, "翻译服务错误 [{}]: {}", provider, message)
                }
            }
            TranslationError::Network {
                message,
                status_code,
            } => {
                if let Some(code) = status_code {
                    write!(f, "网络请求失败 [{}]: {}", code, message)
                } else {
                    write!(f, "网络请求失败: {}", message)
                }
            }
            TranslationError::Mismatch {
                expected,
                actual,
                details,
            } => {
                write!(
                    f,
                    "译文数量不匹配: 期望 {} 个, 实际 {} 个 ({})",
                    expected, actual, details
                )
            }
            TranslationError::StructuralParse { details } => {
                write!(f, "区块结构解析失败: {}", details)
            }
            TranslationError::FileOperation {
                path,
                operation,
                source,
            } => {
                write!(f, "文件{}操作失败 [{}]: {}", operation, path, source)
            }
            TranslationError::InputValidation { input, reason } => {
                write!(f, "输入验证失败 [{}]: {}", input, reason)
            }
            TranslationError::Internal { source } => {
                write!(f, "内部处理错误: {}", source)
            }
        }
    }
}

impl std::error::Error for TranslationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TranslationError::Internal { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// 区块翻译结果类型别名
pub type Result<T> = std::result::Result<T, TranslationError>;

/// 便捷的错误创建宏
#[macro_export]
macro_rules! translation_error {
    (config, $field:expr, $reason:expr) => {
        $crate::error::TranslationError::Configuration {
            field: $field.to_string(),
            reason: $reason.to_string(),
        }
    };
    (provider, $provider:expr, $msg:expr) => {
        $crate::error::TranslationError::Provider {
            provider: $provider.to_string(),
            message: $msg.to_string(),
            status_code: None,
        }
    };
    (provider, $provider:expr, $msg:expr, $code:expr) => {
        $crate::error::TranslationError::Provider {
            provider: $provider.to_string(),
            message: $msg.to_string(),
            status_code: Some($code),
        }
    };
    (mismatch, $expected:expr, $actual:expr, $details:expr) => {
        $crate::error::TranslationError::Mismatch {
            expected: $expected,
            actual: $actual,
            details: $details.to_string(),
        }
    };
    (structure, $details:expr) => {
        $crate::error::TranslationError::StructuralParse {
            details: $details.to_string(),
        }
    };
    (file_op, $path:expr, $op:expr, $source:expr) => {
        $crate::error::TranslationError::FileOperation {
            path: $path.to_string(),
            operation: $op.to_string(),
            source: $source.to_string(),
        }
    };
    (input_validation, $input:expr, $reason:expr) => {
        $crate::error::TranslationError::InputValidation {
            input: $input.to_string(),
            reason: $reason.to_string(),
        }
    };
}

/// 从anyhow::Error转换为TranslationError
impl From<AnyhowError> for TranslationError {
    fn from(error: AnyhowError) -> Self {
        TranslationError::Internal { source: error }
    }
}

/// 从reqwest::Error转换为TranslationError
impl From<reqwest::Error> for TranslationError {
    fn from(error: reqwest::Error) -> Self {
        let status_code = error.status().map(|s| s.as_u16());
        // URL 可能携带凭据，不写入错误信息
        TranslationError::Network {
            message: error.without_url().to_string(),
            status_code,
        }
    }
}

/// 从std::io::Error转换为TranslationError
impl From<std::io::Error> for TranslationError {
    fn from(error: std::io::Error) -> Self {
        TranslationError::FileOperation {
            path: "unknown".to_string(),
            operation: "io".to_string(),
            source: error.to_string(),
        }
    }
}

/// 从serde_json::Error转换为TranslationError
impl From<serde_json::Error> for TranslationError {
    fn from(error: serde_json::Error) -> Self {
        TranslationError::InputValidation {
            input: "json".to_string(),
            reason: error.to_string(),
        }
    }
}

/// 从toml::de::Error转换为TranslationError
impl From<toml::de::Error> for TranslationError {
    fn from(error: toml::de::Error) -> Self {
        TranslationError::Configuration {
            field: "toml".to_string(),
            reason: error.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = TranslationError::Provider {
            provider: "openai".to_string(),
            message: "rate limited".to_string(),
            status_code: Some(429),
        };

        assert_eq!(
            format!("{}", err),
            "翻译服务错误 [openai] [429]: rate limited"
        );
    }

    #[test]
    fn test_error_macro() {
        let err = translation_error!(mismatch, 3, 2, "segments");
        match err {
            TranslationError::Mismatch {
                expected, actual, ..
            } => {
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            _ => panic!("Wrong error type"),
        }
    }

    #[test]
    fn test_fatal_classification() {
        assert!(translation_error!(config, "api_key", "missing").is_fatal());
        assert!(!translation_error!(provider, "claude", "boom").is_fatal());
        assert!(!translation_error!(structure, "unclosed block").is_fatal());
    }

    #[test]
    fn test_anyhow_conversion() {
        let anyhow_err = anyhow::anyhow!("Test anyhow error");
        let translation_err: TranslationError = anyhow_err.into();

        assert_eq!(translation_err.kind(), "InternalError");
    }

    #[tokio::test]
    async fn test_reqwest_conversion_drops_url() {
        let reqwest_err = reqwest::Client::new()
            .get("http://127.0.0.1:9/models?key=SUPERSECRETKEY")
            .send()
            .await
            .unwrap_err();
        let translation_err: TranslationError = reqwest_err.into();

        assert_eq!(translation_err.kind(), "NetworkError");
        assert!(!translation_err.to_string().contains("SUPERSECRETKEY"));
    }
}
