use crate::utils::{
    config::parse_http_url,
    error::TrackerError,
    models::{ GeoResponse, IpResponse, Location, VisitRecord },
};
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::{ net::IpAddr, time::Duration };
use url::Url;

// 查询访客的公网 IP
#[async_trait]
pub trait IpLookup: Send + Sync {
    async fn lookup_ip(&self) -> Result<String, TrackerError>;
}

// 根据 IP 查询大致的地理位置
#[async_trait]
pub trait GeoLookup: Send + Sync {
    async fn lookup_geo(&self, ip: &str) -> Result<Location, TrackerError>;
}

pub fn build_client(timeout: Option<Duration>) -> Result<Client, TrackerError> {
    let mut builder = Client::builder().user_agent(
        concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"))
    );
    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}

// GET 请求，非 2xx 视为失败，返回响应体文本
async fn fetch_text(client: &Client, url: Url) -> Result<String, TrackerError> {
    debug!("GET {}", url);
    let response = client.get(url.clone()).send().await?;
    let status = response.status();
    if !status.is_success() {
        return Err(TrackerError::Status { url: url.to_string(), status });
    }
    Ok(response.text().await?)
}

// 解析 {"ip": "..."}，并确认它确实是 IPv4/IPv6 地址
pub fn parse_ip_body(body: &str) -> Result<String, TrackerError> {
    let parsed: IpResponse = serde_json
        ::from_str(body)
        .map_err(|e| TrackerError::Malformed(format!("IP 响应不是有效的 JSON: {}", e)))?;
    let ip = parsed.ip
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
        .ok_or_else(|| TrackerError::Malformed("IP 响应中没有 ip 字段".to_string()))?;
    ip.parse::<IpAddr>().map_err(|_| TrackerError::Malformed(format!("{} 不是有效的 IP 地址", ip)))?;
    Ok(ip)
}

pub fn parse_geo_body(body: &str) -> Result<Location, TrackerError> {
    let geo: GeoResponse = serde_json
        ::from_str(body)
        .map_err(|e| TrackerError::Malformed(format!("地理位置响应不是有效的 JSON: {}", e)))?;
    if geo.error {
        let reason = geo.reason.unwrap_or_else(|| "unknown".to_string());
        return Err(TrackerError::Service(reason));
    }
    Ok(Location::from(geo))
}

// api.ipify.org
pub struct IpifyLookup {
    client: Client,
    url: Url,
}

impl IpifyLookup {
    pub fn new(client: Client, url: &str) -> Result<Self, TrackerError> {
        Ok(IpifyLookup { client, url: parse_http_url("ip-service", url)? })
    }
}

#[async_trait]
impl IpLookup for IpifyLookup {
    async fn lookup_ip(&self) -> Result<String, TrackerError> {
        let body = fetch_text(&self.client, self.url.clone()).await?;
        parse_ip_body(&body)
    }
}

// ipapi.co，请求地址为 <base>/<ip>/json/
pub struct IpapiLookup {
    client: Client,
    base: Url,
}

impl IpapiLookup {
    pub fn new(client: Client, base: &str) -> Result<Self, TrackerError> {
        Ok(IpapiLookup { client, base: parse_http_url("geo-service", base)? })
    }

    pub fn url_for(&self, ip: &str) -> Result<Url, TrackerError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| TrackerError::InvalidConfig(format!("{} 不能作为基础地址", self.base)))?
            .pop_if_empty()
            .push(ip)
            .push("json")
            .push("");
        Ok(url)
    }
}

#[async_trait]
impl GeoLookup for IpapiLookup {
    async fn lookup_geo(&self, ip: &str) -> Result<Location, TrackerError> {
        let url = self.url_for(ip)?;
        let body = fetch_text(&self.client, url).await?;
        parse_geo_body(&body)
    }
}

// 可选：把访问记录 POST 给服务端（例如 /api/track-visit）
pub struct ServerReporter {
    client: Client,
    endpoint: Url,
}

impl ServerReporter {
    pub fn new(client: Client, endpoint: &str) -> Result<Self, TrackerError> {
        Ok(ServerReporter { client, endpoint: parse_http_url("server-endpoint", endpoint)? })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn send(&self, record: &VisitRecord) -> Result<(), TrackerError> {
        let response = self.client.post(self.endpoint.clone()).json(record).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TrackerError::Status { url: self.endpoint.to_string(), status });
        }
        Ok(())
    }
}
