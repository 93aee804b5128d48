//! 客户端错误类型

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("连接失败: {0}")]
    Connect(String),

    #[error("传输错误: {0}")]
    Transport(String),

    #[error("服务端返回 {status}: {message}")]
    Http { status: u16, message: String },

    #[error("请求失败: {0}")]
    Request(#[from] reqwest::Error),

    #[error("响应解析失败: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("地址无效: {0}")]
    InvalidUrl(String),

    #[error("客户端已关闭")]
    Closed,
}

pub type Result<T> = std::result::Result<T, ClientError>;

impl ClientError {
    /// 网络层错误与服务端 5xx/429 可以重试
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Transport(_) => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            Self::Request(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Decode(_) | Self::InvalidUrl(_) | Self::Closed => false,
        }
    }
}
