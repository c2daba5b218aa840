use crate::utils::{
    error::TrackerError,
    files::{ self, Storage },
    models::VisitRecord,
};
use log::{ debug, warn };
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
}

impl ExportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
        }
    }
}

// 先进先出：超出上限时丢弃最旧的记录，顺序不变
pub fn trim_to_capacity<T>(mut entries: Vec<T>, cap: usize) -> Vec<T> {
    if entries.len() > cap {
        let excess = entries.len() - cap;
        entries.drain(..excess);
    }
    entries
}

// 有上限的访问日志，整个数组以 JSON 字符串存放在一个键下
pub struct VisitLog {
    storage: Box<dyn Storage>,
    key: String,
    capacity: usize,
}

impl VisitLog {
    pub fn new(storage: Box<dyn Storage>, key: impl Into<String>, capacity: usize) -> Self {
        VisitLog { storage, key: key.into(), capacity }
    }

    // 不存在或内容损坏当作空日志；读取失败返回错误，避免覆盖掉已有记录
    fn read_log(&self) -> Result<Vec<VisitRecord>, TrackerError> {
        let raw = match self.storage.get_item(&self.key)? {
            Some(raw) => raw,
            None => {
                return Ok(Vec::new());
            }
        };
        match serde_json::from_str::<Vec<VisitRecord>>(&raw) {
            Ok(records) => Ok(records),
            Err(e) => {
                warn!("访问日志 {} 内容损坏，按空日志处理: {}", self.key, e);
                Ok(Vec::new())
            }
        }
    }

    pub fn get_log(&self) -> Vec<VisitRecord> {
        match self.read_log() {
            Ok(records) => records,
            Err(e) => {
                warn!("读取访问日志 {} 失败，按空日志处理: {}", self.key, e);
                Vec::new()
            }
        }
    }

    pub fn append_to_log(&self, record: VisitRecord) -> Result<(), TrackerError> {
        let mut records = self.read_log()?;
        records.push(record);
        let records = trim_to_capacity(records, self.capacity);
        let value = serde_json::to_string(&records)?;
        self.storage.set_item(&self.key, &value)?;
        debug!("访问日志 {} 现有 {} 条记录", self.key, records.len());
        Ok(())
    }

    // 只读，不修改日志
    pub fn export_log<P>(&self, path: P, format: ExportFormat) -> Result<usize, TrackerError>
        where P: AsRef<Path>
    {
        let records = self.read_log()?;
        match format {
            ExportFormat::Json => files::write_to_json(&path, &records)?,
            ExportFormat::Csv => files::write_to_csv(&path, &records)?,
        }
        Ok(records.len())
    }
}
