use crate::utils::{
    common::now_iso8601,
    config::TrackerConfig,
    error::{ FailureReason, FailureStage, TrackerError },
    files::{ FileStorage, MemoryStorage, Storage },
    models::{ VisitContext, VisitRecord },
    network::{ self, GeoLookup, IpLookup, IpapiLookup, IpifyLookup, ServerReporter },
    visit_log::{ ExportFormat, VisitLog },
};
use log::{ info, warn };
use std::path::Path;

#[derive(Debug)]
pub enum VisitOutcome {
    Success(VisitRecord),
    Failure(FailureReason),
}

// 每次页面访问：查 IP -> 查地理位置 -> 组装记录 -> 写入有上限的日志
pub struct VisitorLogger {
    ip_lookup: Box<dyn IpLookup>,
    geo_lookup: Box<dyn GeoLookup>,
    log: VisitLog,
    reporter: Option<ServerReporter>,
}

// 按配置创建访客记录器（HTTP 查询服务 + 文件或内存存储）
pub fn init_tracker(config: &TrackerConfig) -> Result<VisitorLogger, TrackerError> {
    config.validate()?;
    let client = network::build_client(config.timeout)?;
    let storage: Box<dyn Storage> = if config.ephemeral {
        Box::new(MemoryStorage::new())
    } else {
        Box::new(FileStorage::new(&config.data_dir))
    };
    let reporter = match &config.server_endpoint {
        Some(endpoint) => Some(ServerReporter::new(client.clone(), endpoint)?),
        None => None,
    };
    let tracker = VisitorLogger::new(
        Box::new(IpifyLookup::new(client.clone(), &config.ip_service)?),
        Box::new(IpapiLookup::new(client, &config.geo_service)?),
        VisitLog::new(storage, config.storage_key.clone(), config.capacity)
    ).with_reporter(reporter);
    Ok(tracker)
}

impl VisitorLogger {
    pub fn new(ip_lookup: Box<dyn IpLookup>, geo_lookup: Box<dyn GeoLookup>, log: VisitLog) -> Self {
        VisitorLogger { ip_lookup, geo_lookup, log, reporter: None }
    }

    pub fn with_reporter(mut self, reporter: Option<ServerReporter>) -> Self {
        self.reporter = reporter;
        self
    }

    pub async fn record_visit(&self, context: &VisitContext) -> VisitOutcome {
        let outcome = match self.capture(context).await {
            Ok(record) => VisitOutcome::Success(record),
            Err(reason) => VisitOutcome::Failure(reason),
        };
        match &outcome {
            VisitOutcome::Success(record) => {
                info!(
                    "Visit tracked: {} | {} | {} | {} | {}",
                    record.ip.as_deref().unwrap_or("-"),
                    record.page,
                    record.location.city.as_deref().unwrap_or("-"),
                    record.location.country.as_deref().unwrap_or("-"),
                    record.timestamp
                );
                self.report(record).await;
            }
            VisitOutcome::Failure(reason) => warn!("Visitor tracking failed: {}", reason),
        }
        outcome
    }

    async fn capture(&self, context: &VisitContext) -> Result<VisitRecord, FailureReason> {
        let ip = self.ip_lookup
            .lookup_ip().await
            .map_err(|e| FailureReason::new(FailureStage::IpLookup, e))?;
        let location = self.geo_lookup
            .lookup_geo(&ip).await
            .map_err(|e| FailureReason::new(FailureStage::GeoLookup, e))?;
        let record = VisitRecord::new(ip, now_iso8601(), context, location);
        self.append_to_log(record.clone())
            .map_err(|e| FailureReason::new(FailureStage::Store, e))?;
        Ok(record)
    }

    // 服务端上报失败只记日志，不影响结果
    async fn report(&self, record: &VisitRecord) {
        if let Some(reporter) = &self.reporter {
            match reporter.send(record).await {
                Ok(()) => info!("Visit sent to {}", reporter.endpoint()),
                Err(e) => warn!("Server logging failed: {}", e),
            }
        }
    }

    pub fn append_to_log(&self, record: VisitRecord) -> Result<(), TrackerError> {
        self.log.append_to_log(record)
    }

    pub fn get_log(&self) -> Vec<VisitRecord> {
        self.log.get_log()
    }

    pub fn export_log<P>(&self, path: P, format: ExportFormat) -> Result<usize, TrackerError>
        where P: AsRef<Path>
    {
        self.log.export_log(path, format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{ models::Location, network::tests::serve_once };
    use async_trait::async_trait;
    use chrono::DateTime;
    use std::sync::{ atomic::{ AtomicUsize, Ordering }, Arc };

    struct FixedIp(&'static str);

    #[async_trait]
    impl IpLookup for FixedIp {
        async fn lookup_ip(&self) -> Result<String, TrackerError> {
            Ok(self.0.to_string())
        }
    }

    struct FailingIp;

    #[async_trait]
    impl IpLookup for FailingIp {
        async fn lookup_ip(&self) -> Result<String, TrackerError> {
            Err(TrackerError::Malformed("not json".to_string()))
        }
    }

    // 记录被调用的次数和收到的 IP
    struct FixedGeo {
        city: &'static str,
        calls: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl GeoLookup for FixedGeo {
        async fn lookup_geo(&self, ip: &str) -> Result<Location, TrackerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(TrackerError::Service("RateLimited".to_string()));
            }
            assert_eq!(ip, "1.2.3.4");
            Ok(Location {
                city: Some(self.city.to_string()),
                region: Some("North".to_string()),
                country: Some("Nowhere".to_string()),
                org: Some("AS1 Example".to_string()),
            })
        }
    }

    // 只读的存储，写入总是失败
    struct ReadOnlyStorage;

    impl Storage for ReadOnlyStorage {
        fn get_item(&self, _key: &str) -> std::io::Result<Option<String>> {
            Ok(None)
        }
        fn set_item(&self, _key: &str, _value: &str) -> std::io::Result<()> {
            Err(std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"))
        }
    }

    fn geo(fail: bool) -> (Box<FixedGeo>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        (Box::new(FixedGeo { city: "Testville", calls: calls.clone(), fail }), calls)
    }

    fn memory_log() -> VisitLog {
        VisitLog::new(Box::new(MemoryStorage::new()), "site_visits", 100)
    }

    fn succeeded(outcome: &VisitOutcome) -> bool {
        matches!(outcome, VisitOutcome::Success(_))
    }

    fn context() -> VisitContext {
        VisitContext {
            page: "/index.html".to_string(),
            user_agent: "Mozilla/5.0".to_string(),
            referrer: "https://scholar.example.org/".to_string(),
        }
    }

    #[tokio::test]
    async fn successful_visit_is_stored() {
        let (geo, calls) = geo(false);
        let tracker = VisitorLogger::new(Box::new(FixedIp("1.2.3.4")), geo, memory_log());
        assert!(tracker.get_log().is_empty());

        let outcome = tracker.record_visit(&context()).await;
        assert!(succeeded(&outcome));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let log = tracker.get_log();
        assert_eq!(log.len(), 1);
        let record = &log[0];
        assert_eq!(record.ip.as_deref(), Some("1.2.3.4"));
        assert_eq!(record.location.city.as_deref(), Some("Testville"));
        assert_eq!(record.page, "/index.html");
        assert_eq!(record.referrer, "https://scholar.example.org/");
        assert!(DateTime::parse_from_rfc3339(&record.timestamp).is_ok());

        match outcome {
            VisitOutcome::Success(returned) => assert_eq!(&returned, record),
            VisitOutcome::Failure(reason) => panic!("unexpected failure: {}", reason),
        }
    }

    #[tokio::test]
    async fn ip_lookup_failure_stores_nothing_and_skips_geo() {
        let (geo, calls) = geo(false);
        let tracker = VisitorLogger::new(Box::new(FailingIp), geo, memory_log());

        let outcome = tracker.record_visit(&context()).await;
        match outcome {
            VisitOutcome::Failure(reason) => assert_eq!(reason.stage, FailureStage::IpLookup),
            VisitOutcome::Success(_) => panic!("expected failure"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(tracker.get_log().is_empty());
    }

    #[tokio::test]
    async fn geo_lookup_failure_leaves_log_unchanged() {
        let (ok_geo, _) = geo(false);
        let log = memory_log();
        let seeded = VisitorLogger::new(Box::new(FixedIp("1.2.3.4")), ok_geo, log);
        assert!(succeeded(&seeded.record_visit(&context()).await));
        let before = seeded.get_log();

        let (failing_geo, calls) = geo(true);
        let tracker = VisitorLogger {
            geo_lookup: failing_geo,
            ..seeded
        };
        let outcome = tracker.record_visit(&context()).await;
        match outcome {
            VisitOutcome::Failure(reason) => {
                assert_eq!(reason.stage, FailureStage::GeoLookup);
                assert!(matches!(reason.source, TrackerError::Service(_)));
            }
            VisitOutcome::Success(_) => panic!("expected failure"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.get_log(), before);
    }

    #[tokio::test]
    async fn storage_write_failure_is_reported() {
        let (geo, _) = geo(false);
        let log = VisitLog::new(Box::new(ReadOnlyStorage), "site_visits", 100);
        let tracker = VisitorLogger::new(Box::new(FixedIp("1.2.3.4")), geo, log);

        match tracker.record_visit(&context()).await {
            VisitOutcome::Failure(reason) => {
                assert_eq!(reason.stage, FailureStage::Store);
                assert!(matches!(reason.source, TrackerError::Storage(_)));
            }
            VisitOutcome::Success(_) => panic!("expected failure"),
        }
    }

    #[tokio::test]
    async fn repeated_visits_stay_capped() {
        let (geo, _) = geo(false);
        let log = VisitLog::new(Box::new(MemoryStorage::new()), "site_visits", 3);
        let tracker = VisitorLogger::new(Box::new(FixedIp("1.2.3.4")), geo, log);
        for page in ["/a", "/b", "/c", "/d"] {
            let ctx = VisitContext { page: page.to_string(), ..context() };
            assert!(succeeded(&tracker.record_visit(&ctx).await));
        }
        let pages: Vec<String> = tracker
            .get_log()
            .into_iter()
            .map(|r| r.page)
            .collect();
        assert_eq!(pages, vec!["/b", "/c", "/d"]);
    }

    #[tokio::test]
    async fn server_failure_does_not_change_outcome() {
        let (addr, _server) = serve_once("500 Internal Server Error", "{}").await;
        let endpoint = format!("{}/api/track-visit", addr);
        let reporter = ServerReporter::new(network::build_client(None).unwrap(), &endpoint).unwrap();

        let (geo, _) = geo(false);
        let tracker = VisitorLogger::new(
            Box::new(FixedIp("1.2.3.4")),
            geo,
            memory_log()
        ).with_reporter(Some(reporter));

        assert!(succeeded(&tracker.record_visit(&context()).await));
        assert_eq!(tracker.get_log().len(), 1);
    }

    #[test]
    fn init_tracker_rejects_invalid_config() {
        let config = TrackerConfig { capacity: 0, ..Default::default() };
        assert!(init_tracker(&config).is_err());
    }

    #[test]
    fn init_tracker_uses_file_storage_in_data_dir() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = TrackerConfig { data_dir: dir.path().join("data"), ..Default::default() };
        let tracker = init_tracker(&config).unwrap();
        assert!(tracker.get_log().is_empty());

        let record = VisitRecord::new(
            "1.2.3.4".to_string(),
            now_iso8601(),
            &context(),
            Location::default()
        );
        tracker.append_to_log(record.clone()).unwrap();
        assert!(dir.path().join("data").join("harman_site_visits.json").exists());

        let reopened = init_tracker(&config).unwrap();
        assert_eq!(reopened.get_log(), vec![record]);
    }
}
