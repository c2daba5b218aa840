mod utils;

use clap::{ Args, Parser, Subcommand, ValueEnum };
use log::info;
use std::{ path::PathBuf, time::{ Duration, Instant } };
use utils::{
    common::{ format_date, format_duration },
    config::{ self, TrackerConfig },
    logger::init_logger,
    models::{ VisitContext, VisitRecord },
    tracker::{ init_tracker, VisitOutcome },
    visit_log::ExportFormat,
};

#[derive(Parser, Debug)]
#[command(name = "visit_tracker", version, about = "记录访客的 IP 与地理位置，只保留最近的访问")]
struct Cli {
    /// 访问日志所在目录
    #[arg(long, default_value = config::DEFAULT_DATA_DIR)]
    data_dir: PathBuf,

    /// 最多保留多少条访问记录
    #[arg(long, default_value_t = config::DEFAULT_CAPACITY)]
    capacity: usize,

    /// 只保存在内存中（用于试运行）
    #[arg(long)]
    ephemeral: bool,

    #[arg(long, default_value = "info")]
    log_level: log::LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 查询 IP 与地理位置，记录一次访问
    Record(RecordArgs),
    /// 显示访问日志
    Show {
        /// 输出原始 JSON
        #[arg(long)]
        json: bool,
    },
    /// 导出访问日志到文件
    Export {
        /// 默认 harman_site_visits.json / harman_site_visits.csv
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
}

#[derive(Args, Debug)]
struct RecordArgs {
    #[arg(long, default_value = "/")]
    page: String,
    #[arg(long, default_value = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))]
    user_agent: String,
    #[arg(long, default_value = "")]
    referrer: String,
    #[arg(long, default_value = config::DEFAULT_IP_SERVICE)]
    ip_service: String,
    #[arg(long, default_value = config::DEFAULT_GEO_SERVICE)]
    geo_service: String,
    /// 例如 https://example.org/api/track-visit，不填则不上报
    #[arg(long)]
    server_endpoint: Option<String>,
    /// 请求超时（秒），默认不限
    #[arg(long)]
    timeout_secs: Option<u64>,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum Format {
    Json,
    Csv,
}

impl From<Format> for ExportFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Json => ExportFormat::Json,
            Format::Csv => ExportFormat::Csv,
        }
    }
}

impl Cli {
    fn tracker_config(&self) -> TrackerConfig {
        let mut config = TrackerConfig {
            data_dir: self.data_dir.clone(),
            capacity: self.capacity,
            ephemeral: self.ephemeral,
            ..Default::default()
        };
        if let Command::Record(args) = &self.command {
            config.ip_service = args.ip_service.clone();
            config.geo_service = args.geo_service.clone();
            config.server_endpoint = args.server_endpoint.clone();
            config.timeout = args.timeout_secs.map(Duration::from_secs);
        }
        config
    }
}

// 表格形式打印访问日志
fn print_table(records: &[VisitRecord]) {
    if records.is_empty() {
        println!("没有访问记录");
        return;
    }
    for (i, record) in records.iter().enumerate() {
        let location = [&record.location.city, &record.location.region, &record.location.country]
            .iter()
            .filter_map(|v| v.as_deref())
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:>3} | {} | {:<39} | {} | {} | {}",
            i + 1,
            format_date(&record.timestamp),
            record.ip.as_deref().unwrap_or("-"),
            record.page,
            if location.is_empty() { "-" } else { location.as_str() },
            record.location.org.as_deref().unwrap_or("-")
        );
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let start_time = Instant::now();
    let cli = Cli::parse();
    init_logger(cli.log_level)?;

    let tracker = init_tracker(&cli.tracker_config())?;

    match &cli.command {
        Command::Record(args) => {
            let context = VisitContext {
                page: args.page.clone(),
                user_agent: args.user_agent.clone(),
                referrer: args.referrer.clone(),
            };
            // 尽力而为：失败已在 record_visit 中记录日志，这里正常退出
            if let VisitOutcome::Success(record) = tracker.record_visit(&context).await {
                println!("{}", serde_json::to_string_pretty(&record)?);
            }
        }
        Command::Show { json } => {
            let records = tracker.get_log();
            if *json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_table(&records);
            }
        }
        Command::Export { output, format } => {
            let format = ExportFormat::from(*format);
            let path = output
                .clone()
                .unwrap_or_else(||
                    PathBuf::from(format!("{}.{}", config::EXPORT_FILE_NAME, format.extension()))
                );
            let count = tracker.export_log(&path, format)?;
            info!("已导出 {} 条访问记录到 {}", count, path.display());
        }
    }

    let (elapsed_time, unit) = format_duration(start_time.elapsed());
    info!("完成，耗时：{:.2} {}", elapsed_time, unit);
    Ok(())
}
