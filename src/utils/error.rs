use std::{ fmt, io };
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TrackerError {
    #[error("请求失败: {0}")]
    Network(#[from] reqwest::Error),

    #[error("{url} 返回状态码 {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("响应内容无法解析: {0}")]
    Malformed(String),

    // 服务返回了 200，但响应体标记为错误（例如 ipapi.co 的限流）
    #[error("服务返回错误: {0}")]
    Service(String),

    #[error("存储读写失败: {0}")]
    Storage(#[from] io::Error),

    #[error("序列化失败: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("CSV 写入失败: {0}")]
    Csv(#[from] csv::Error),

    #[error("配置无效: {0}")]
    InvalidConfig(String),
}

// 失败发生在哪一步
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    IpLookup,
    GeoLookup,
    Store,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureStage::IpLookup => "IP 查询",
            FailureStage::GeoLookup => "地理位置查询",
            FailureStage::Store => "写入访问日志",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
#[error("{stage}失败: {source}")]
pub struct FailureReason {
    pub stage: FailureStage,
    #[source]
    pub source: TrackerError,
}

impl FailureReason {
    pub fn new(stage: FailureStage, source: TrackerError) -> Self {
        FailureReason { stage, source }
    }
}
