use serde::{ Deserialize, Serialize };

// 一次访问记录（与存储中的 JSON 字段名保持一致）
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VisitRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
    pub timestamp: String,
    #[serde(default)]
    pub page: String,
    #[serde(default)]
    pub user_agent: String,
    #[serde(default)]
    pub referrer: String,
    #[serde(default)]
    pub location: Location,
}

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Location {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub org: Option<String>,
}

// 访问发生时的页面环境（页面路径、UA、来源）
#[derive(Debug, Clone, Default)]
pub struct VisitContext {
    pub page: String,
    pub user_agent: String,
    pub referrer: String,
}

// IP 查询服务的响应体，例如 {"ip":"1.2.3.4"}
#[derive(Debug, Deserialize)]
pub struct IpResponse {
    pub ip: Option<String>,
}

// 地理位置服务的响应体，只取需要的字段
#[derive(Debug, Deserialize, Default)]
pub struct GeoResponse {
    pub city: Option<String>,
    pub region: Option<String>,
    pub country_name: Option<String>,
    pub org: Option<String>,
    #[serde(default)]
    pub error: bool,
    pub reason: Option<String>,
}

impl From<GeoResponse> for Location {
    fn from(geo: GeoResponse) -> Self {
        Location {
            city: geo.city,
            region: geo.region,
            country: geo.country_name,
            org: geo.org,
        }
    }
}

impl VisitRecord {
    pub fn new(ip: String, timestamp: String, context: &VisitContext, location: Location) -> Self {
        VisitRecord {
            ip: Some(ip),
            timestamp,
            page: context.page.clone(),
            user_agent: context.user_agent.clone(),
            referrer: context.referrer.clone(),
            location,
        }
    }

    // 导出 CSV 时的一行
    pub fn to_csv_row(&self) -> Vec<String> {
        let opt = |v: &Option<String>| v.clone().unwrap_or_default();
        vec![
            opt(&self.ip),
            self.timestamp.clone(),
            self.page.clone(),
            self.user_agent.clone(),
            self.referrer.clone(),
            opt(&self.location.city),
            opt(&self.location.region),
            opt(&self.location.country),
            opt(&self.location.org)
        ]
    }
}

pub const CSV_HEADER: [&str; 9] = [
    "ip",
    "timestamp",
    "page",
    "userAgent",
    "referrer",
    "city",
    "region",
    "country",
    "org",
];
