use crate::utils::{ error::TrackerError, models::{ VisitRecord, CSV_HEADER } };
use csv::Writer;
use std::{
    collections::HashMap,
    fs::{ self, File },
    io::{ self, BufWriter, Write },
    path::{ Path, PathBuf },
    sync::Mutex,
};

// 键值存储，相当于浏览器的 localStorage：值都是字符串
pub trait Storage: Send + Sync {
    fn get_item(&self, key: &str) -> io::Result<Option<String>>;
    fn set_item(&self, key: &str, value: &str) -> io::Result<()>;
}

// 每个键对应目录下的一个文件：<dir>/<key>.json
#[derive(Debug, Clone)]
pub struct FileStorage {
    dir: PathBuf,
}

impl FileStorage {
    pub fn new<P>(dir: P) -> Self where P: AsRef<Path> {
        FileStorage { dir: dir.as_ref().to_path_buf() }
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Storage for FileStorage {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        match fs::read_to_string(self.path_for(key)) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn set_item(&self, key: &str, value: &str) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // 先写临时文件再改名，避免写到一半留下损坏的数据
        let tmp_path = path.with_extension("json.tmp");
        {
            let mut file = File::create(&tmp_path)?;
            file.write_all(value.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        MemoryStorage::default()
    }
}

impl Storage for MemoryStorage {
    fn get_item(&self, key: &str) -> io::Result<Option<String>> {
        let items = self.items.lock().map_err(|_| io::Error::other("storage lock poisoned"))?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> io::Result<()> {
        let mut items = self.items.lock().map_err(|_| io::Error::other("storage lock poisoned"))?;
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

// 导出为格式化（缩进 2 空格）的 JSON 数组
pub fn write_to_json<P>(path: P, records: &[VisitRecord]) -> Result<(), TrackerError>
    where P: AsRef<Path>
{
    let mut writer = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut writer, records)?;
    writeln!(writer)?;
    writer.flush()?;
    Ok(())
}

pub fn write_to_csv<P>(path: P, records: &[VisitRecord]) -> Result<(), TrackerError>
    where P: AsRef<Path>
{
    let mut wtr = Writer::from_path(path)?;
    wtr.write_record(CSV_HEADER)?;
    for record in records {
        wtr.write_record(record.to_csv_row())?;
    }
    wtr.flush()?;
    Ok(())
}
