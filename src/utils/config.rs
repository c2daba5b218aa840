use crate::utils::error::TrackerError;
use std::{ path::PathBuf, time::Duration };
use url::Url;

pub const DEFAULT_IP_SERVICE: &str = "https://api.ipify.org?format=json";
pub const DEFAULT_GEO_SERVICE: &str = "https://ipapi.co/";
pub const DEFAULT_CAPACITY: usize = 100;
pub const VISITS_KEY: &str = "harman_site_visits";
pub const EXPORT_FILE_NAME: &str = "harman_site_visits";
pub const DEFAULT_DATA_DIR: &str = ".visit_tracker";

#[derive(Debug, Clone)]
pub struct TrackerConfig {
    pub data_dir: PathBuf,
    pub storage_key: String,
    pub capacity: usize,
    pub ip_service: String,
    pub geo_service: String,
    // 可选：把访问记录 POST 到服务端（例如 /api/track-visit），默认不启用
    pub server_endpoint: Option<String>,
    // 默认不设超时，与浏览器 fetch 行为一致
    pub timeout: Option<Duration>,
    // 只在内存中保存，不落盘
    pub ephemeral: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        TrackerConfig {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            storage_key: VISITS_KEY.to_string(),
            capacity: DEFAULT_CAPACITY,
            ip_service: DEFAULT_IP_SERVICE.to_string(),
            geo_service: DEFAULT_GEO_SERVICE.to_string(),
            server_endpoint: None,
            timeout: None,
            ephemeral: false,
        }
    }
}

impl TrackerConfig {
    // 在发出任何请求之前检查配置
    pub fn validate(&self) -> Result<(), TrackerError> {
        if self.capacity == 0 {
            return Err(TrackerError::InvalidConfig("capacity 必须大于 0".to_string()));
        }
        if self.storage_key.trim().is_empty() {
            return Err(TrackerError::InvalidConfig("storage key 不能为空".to_string()));
        }
        parse_http_url("ip-service", &self.ip_service)?;
        let geo = parse_http_url("geo-service", &self.geo_service)?;
        if geo.cannot_be_a_base() {
            return Err(
                TrackerError::InvalidConfig(format!("geo-service 不能作为基础地址: {}", geo))
            );
        }
        if let Some(endpoint) = &self.server_endpoint {
            parse_http_url("server-endpoint", endpoint)?;
        }
        Ok(())
    }
}

pub fn parse_http_url(name: &str, raw: &str) -> Result<Url, TrackerError> {
    let url = Url::parse(raw).map_err(|e|
        TrackerError::InvalidConfig(format!("{} 不是有效的 URL ({}): {}", name, raw, e))
    )?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other =>
            Err(
                TrackerError::InvalidConfig(
                    format!("{} 只支持 http/https，当前是 {}", name, other)
                )
            ),
    }
}
