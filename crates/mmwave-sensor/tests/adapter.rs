use std::sync::Arc;
use std::time::Duration;

use mmwave_driver::sim::{SimEvent, SimFactory};
use mmwave_driver::Verbosity;
use mmwave_proto::{DetectionStatus, Reading};
use mmwave_sensor::{
    ComponentConfig, Mmwave, Model, ModelFamily, RadarParams, Resource, ResourceError, Sensor,
};
use serde_json::{json, Map};

fn config() -> ComponentConfig {
    ComponentConfig::new("radar-1", Mmwave::model())
}

fn fast() -> RadarParams {
    RadarParams { settle: Duration::ZERO, ..RadarParams::default() }
}

async fn ready(data: Option<Vec<Vec<i64>>>) -> (Mmwave, SimFactory) {
    let sim = SimFactory::with_data(data);
    let s = Mmwave::with_params(&config(), Arc::new(sim.clone()), fast()).await;
    (s, sim)
}

fn assert_zeroed(r: &Reading, status: DetectionStatus) {
    assert_eq!(*r, Reading::zeroed(status));
}

#[tokio::test]
async fn moving_target_scenario() {
    let (s, sim) = ready(Some(vec![vec![1, 150, 80, 0, 0, 150]])).await;
    assert!(s.is_ready().await);

    let got = s.get_readings(None, None).await.unwrap();
    let want = json!({
        "detection_status": "Moving Target",
        "moving_distance_cm": 150,
        "moving_energy": 80,
        "static_distance_cm": 0,
        "static_energy": 0,
        "overall_distance_cm": 150,
    });
    assert_eq!(serde_json::Value::Object(got), want);

    let s_open = sim.stats().last_open.unwrap();
    assert_eq!(s_open, ("/dev/ttyUSB0".to_string(), 256_000, Verbosity::Info));
}

#[tokio::test]
async fn detection_type_table() {
    let cases = [
        (vec![0, 0, 0, 0, 0, 0], DetectionStatus::NoTarget),
        (vec![1, 120, 60, 0, 0, 120], DetectionStatus::MovingTarget),
        (vec![2, 0, 0, 95, 45, 95], DetectionStatus::StaticTarget),
        (vec![3, 110, 30, 100, 50, 100], DetectionStatus::MovingAndStaticTargets),
        (vec![4, 1, 2, 3, 4, 5], DetectionStatus::Unknown),
        (vec![255, 0, 0, 0, 0, 0], DetectionStatus::Unknown),
    ];
    let (s, sim) = ready(None).await;
    for (frame, status) in cases {
        sim.set_data(Some(vec![frame.clone()]));
        let r = s.read().await;
        assert_eq!(r.detection_status, status, "frame {:?}", frame);
        assert_eq!(r.overall_distance_cm, frame[5]);
    }
}

#[tokio::test]
async fn only_first_frame_is_decoded() {
    let (s, _sim) = ready(Some(vec![vec![2, 0, 0, 90, 40, 90], vec![1, 300, 70, 0, 0, 300]])).await;
    assert_eq!(s.read().await.detection_status, DetectionStatus::StaticTarget);
}

#[tokio::test]
async fn no_frame_reads_no_data() {
    let (s, sim) = ready(None).await;
    assert_zeroed(&s.read().await, DetectionStatus::NoData);

    sim.set_data(Some(vec![]));
    assert_zeroed(&s.read().await, DetectionStatus::NoData);

    // Wrong shape: five fields, engineering-mode style long frame.
    sim.set_data(Some(vec![vec![1, 150, 80, 0, 0]]));
    assert_zeroed(&s.read().await, DetectionStatus::NoData);
    sim.set_data(Some(vec![vec![1, 150, 80, 0, 0, 150, 8, 9, 10]]));
    assert_zeroed(&s.read().await, DetectionStatus::NoData);

    let m = s.get_readings(None, Some(Duration::from_millis(5))).await.unwrap();
    assert_eq!(m["detection_status"], "No Data");
}

#[tokio::test]
async fn absent_device_reads_error() {
    let sim = SimFactory::new();
    sim.fail_open(Some("No such file or directory"));
    let s = Mmwave::with_params(&config(), Arc::new(sim.clone()), fast()).await;

    assert!(!s.is_ready().await);
    let m = s.get_readings(None, None).await.unwrap();
    assert_eq!(m["detection_status"], "Error");
    for k in Reading::FIELDS.iter().skip(1) {
        assert_eq!(m[*k], 0, "{}", k);
    }
    assert_eq!(sim.stats().opens, 0);
}

#[tokio::test]
async fn failed_start_releases_the_handle() {
    let sim = SimFactory::with_data(Some(vec![vec![1, 150, 80, 0, 0, 150]]));
    sim.fail_start(Some("handshake timeout"));
    let s = Mmwave::with_params(&config(), Arc::new(sim.clone()), fast()).await;

    assert!(!s.is_ready().await);
    assert_eq!(s.read().await.detection_status, DetectionStatus::Error);
    let st = sim.stats();
    assert_eq!((st.opens, st.stops, st.live), (1, 1, 0));
}

#[tokio::test]
async fn reconfigure_stops_before_reopening() {
    let (s, sim) = ready(Some(vec![vec![0, 0, 0, 0, 0, 0]])).await;
    s.reconfigure(&config()).await;
    assert!(s.is_ready().await);

    let st = sim.stats();
    assert_eq!(st.max_live, 1);
    assert_eq!(st.live, 1);
    assert_eq!(
        st.events,
        vec![
            SimEvent::Open(1),
            SimEvent::Start(1),
            SimEvent::Stop(1),
            SimEvent::Open(2),
            SimEvent::Start(2),
        ]
    );
}

#[tokio::test]
async fn failed_reconfigure_drops_to_unconfigured() {
    let (s, sim) = ready(Some(vec![vec![1, 150, 80, 0, 0, 150]])).await;
    assert_eq!(s.read().await.detection_status, DetectionStatus::MovingTarget);

    sim.fail_open(Some("permission denied"));
    s.reconfigure(&config()).await;
    assert!(!s.is_ready().await);
    assert_eq!(s.read().await.detection_status, DetectionStatus::Error);
    assert_eq!(sim.stats().live, 0);

    // and back
    sim.fail_open(None);
    s.reconfigure(&config()).await;
    assert!(s.is_ready().await);
    assert_eq!(s.read().await.detection_status, DetectionStatus::MovingTarget);
}

#[tokio::test]
async fn stop_failure_on_reconfigure_leaves_no_handle() {
    let (s, sim) = ready(Some(vec![vec![0, 0, 0, 0, 0, 0]])).await;
    sim.fail_stop(Some("port wedged"));
    s.reconfigure(&config()).await;

    assert!(!s.is_ready().await);
    let st = sim.stats();
    assert_eq!(st.opens, 1);
    assert_eq!(st.live, 0);
}

#[tokio::test(start_paused = true)]
async fn readers_wait_out_a_reconfigure() {
    let sim = SimFactory::with_data(Some(vec![vec![1, 150, 80, 0, 0, 150]]));
    let params = RadarParams { settle: Duration::from_secs(1), ..RadarParams::default() };
    let s = Arc::new(Mmwave::with_params(&config(), Arc::new(sim.clone()), params).await);

    let r = s.clone();
    let reconf = tokio::spawn(async move { r.reconfigure(&config()).await });

    // The second handle is open and settling.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sim.stats().opens, 2);
    assert!(!reconf.is_finished());

    let readers: Vec<_> = (0..16)
        .map(|_| {
            let r = s.clone();
            tokio::spawn(async move { r.read().await.detection_status })
        })
        .collect();

    // Still mid-settle: nobody got a reading out of the empty slot.
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(!reconf.is_finished());
    assert!(readers.iter().all(|h| !h.is_finished()));

    reconf.await.unwrap();
    for h in readers {
        assert_eq!(h.await.unwrap(), DetectionStatus::MovingTarget);
    }
}

/// Wraps the line backend and records, at every open, how many descriptors
/// of this process still point at the capture file.
#[cfg(target_os = "linux")]
struct CountingLineFactory {
    capture: std::path::PathBuf,
    seen: std::sync::Mutex<Vec<usize>>,
}

#[cfg(target_os = "linux")]
impl CountingLineFactory {
    fn open_fds(&self) -> usize {
        let target = std::fs::canonicalize(&self.capture).unwrap();
        std::fs::read_dir("/proc/self/fd")
            .unwrap()
            .filter_map(|e| e.ok())
            .filter_map(|e| std::fs::read_link(e.path()).ok())
            .filter(|p| *p == target)
            .count()
    }
}

#[cfg(target_os = "linux")]
impl mmwave_driver::DriverFactory for CountingLineFactory {
    fn open(
        &self,
        path: &str,
        baud: u32,
        verbosity: Verbosity,
    ) -> anyhow::Result<Box<dyn mmwave_driver::RadarDriver>> {
        self.seen.lock().unwrap().push(self.open_fds());
        mmwave_driver::DriverFactory::open(&mmwave_driver::line::LineFactory, path, baud, verbosity)
    }
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn reconfigure_closes_the_old_port_first() {
    let dir = tempfile::tempdir().unwrap();
    let capture = dir.path().join("desk.txt");
    std::fs::write(&capture, "1,150,80,0,0,150\n").unwrap();

    let factory = Arc::new(CountingLineFactory {
        capture: capture.clone(),
        seen: std::sync::Mutex::new(Vec::new()),
    });
    let params = RadarParams {
        device: capture.to_str().unwrap().to_string(),
        settle: Duration::from_millis(200),
        ..RadarParams::default()
    };
    let s = Mmwave::with_params(&config(), factory.clone(), params).await;
    assert_eq!(s.read().await.detection_status, DetectionStatus::MovingTarget);

    s.reconfigure(&config()).await;
    assert!(s.is_ready().await);
    assert_eq!(*factory.seen.lock().unwrap(), vec![0, 0]);
    assert_eq!(factory.open_fds(), 1);

    s.close().await;
    assert_eq!(factory.open_fds(), 0);
}

#[tokio::test]
async fn close_and_drop_stop_the_radar() {
    let (s, sim) = ready(None).await;
    s.close().await;
    assert!(!s.is_ready().await);
    assert_eq!(s.read().await.detection_status, DetectionStatus::Error);
    assert_eq!(sim.stats().stops, 1);

    let (s, sim) = ready(None).await;
    drop(s);
    let st = sim.stats();
    assert_eq!((st.stops, st.live), (1, 0));
}

#[tokio::test]
async fn unsupported_methods() {
    let (s, _sim) = ready(None).await;
    let cmd: Map<String, serde_json::Value> = json!({"restart": true}).as_object().unwrap().clone();

    match s.do_command(&cmd, None).await {
        Err(ResourceError::NotImplemented { method }) => assert_eq!(method, "do_command"),
        other => panic!("unexpected {:?}", other),
    }
    match s.get_geometries(None, Some(Duration::from_secs(1))).await {
        Err(ResourceError::NotImplemented { method }) => assert_eq!(method, "get_geometries"),
        other => panic!("unexpected {:?}", other),
    }

    // Also when the radar is absent.
    s.close().await;
    assert!(matches!(s.do_command(&Map::new(), None).await, Err(ResourceError::NotImplemented { .. })));
}

#[tokio::test]
async fn validate_config_contract() {
    assert_eq!(Mmwave::validate_config(&config()).unwrap(), Vec::<String>::new());

    let nameless = ComponentConfig::new("  ", Mmwave::model());
    assert!(matches!(Mmwave::validate_config(&nameless), Err(ResourceError::InvalidConfig(_))));

    let foreign = ComponentConfig::new("radar-1", Model::new(ModelFamily::new("acme", "radar"), "ld2450"));
    let err = Mmwave::validate_config(&foreign).unwrap_err();
    assert!(err.to_string().contains("joyce:mmwave:mmwave"));
}

#[tokio::test(start_paused = true)]
async fn default_settle_is_two_seconds() {
    let sim = SimFactory::with_data(Some(vec![vec![0, 0, 0, 0, 0, 0]]));
    let t0 = tokio::time::Instant::now();
    let s = Mmwave::new(&config(), Arc::new(sim)).await;
    assert!(t0.elapsed() >= Duration::from_secs(2));
    assert_eq!(s.params(), &RadarParams::default());
    assert_eq!(s.read().await.detection_status, DetectionStatus::NoTarget);
}
