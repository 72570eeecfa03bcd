//! # Integration Tests
//!
//! 集成测试与端到端测试。
//!
//! 负责：
//! - 合约快照测试
//! - 模拟 e2e 测试（无需 CARLA）
//! - 真实服务器测试 (`real-carla`，默认忽略)

#[cfg(test)]
mod contract_tests {
    use contracts::{SensorKind, SessionBlueprint};

    #[test]
    fn test_contracts_compile() {
        // 验证 contracts crate 可编译
        let _ = contracts::ConfigVersion::V1;
    }

    #[test]
    fn test_default_blueprint_round_trips_through_toml() {
        let bp = SessionBlueprint::full();
        let toml = config_loader::ConfigLoader::to_toml(&bp).unwrap();
        let parsed =
            config_loader::ConfigLoader::load_from_str(&toml, config_loader::ConfigFormat::Toml)
                .unwrap();
        assert_eq!(parsed.sensors.len(), bp.sensors.len());
        assert_eq!(parsed.output.velocity_file, "final_velocity.txt");
        assert!(parsed.sensor_of_kind(SensorKind::Radar).is_some());
    }

    #[test]
    fn test_sample_session_matches_defaults() {
        let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("../../session.toml");
        let bp = config_loader::ConfigLoader::load_from_path(&path).unwrap();
        let defaults = SessionBlueprint::full();

        assert_eq!(bp.sensors.len(), defaults.sensors.len());
        for (sample, default) in bp.sensors.iter().zip(&defaults.sensors) {
            assert_eq!(sample.id, default.id);
            assert_eq!(sample.kind, default.kind);
            assert_eq!(sample.transform, default.transform);
            assert_eq!(sample.attributes, default.attributes);
        }
        assert_eq!(bp.weather, defaults.weather);
        assert_eq!(bp.ego.traffic_manager, defaults.ego.traffic_manager);
        assert_eq!(bp.output.gif.frame_count, 30);
        assert!(bp.seed.is_none());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::fs;
    use std::path::Path;

    use actor_factory::{MockCarlaClient, MockConfig, MockSensorConfig};
    use carla_recorder::Session;
    use contracts::{SensorKind, SessionBlueprint};
    use observability::{LogFormat, ObservabilityConfig};
    use recorder::output::{
        DEPTH_NPY_DIR, DEPTH_PNG_DIR, DVS_NPY_DIR, GIF_FRAMES_DIR, RADAR_CSV, RADAR_DIR, RGB_DIR,
        SEGMENTATION_DIR, SEGMENTATION_NPY_DIR,
    };
    use tempfile::tempdir;

    /// Route session logs through the same subscriber the binary installs
    fn init_tracing() {
        static INIT: std::sync::Once = std::sync::Once::new();
        INIT.call_once(|| {
            observability::init_with_config(ObservabilityConfig {
                log_format: LogFormat::Compact,
                metrics_port: None,
                default_log_level: "warn".to_string(),
            })
            .unwrap();
        });
    }

    fn short_session(root: &Path, blueprint: SessionBlueprint) -> SessionBlueprint {
        let mut bp = blueprint;
        bp.output.root = root.to_path_buf();
        bp.recording.duration_sec = 0.5;
        bp.crash.hold_sec = 0.1;
        bp.seed = Some(42);
        bp
    }

    fn mock_client() -> MockCarlaClient {
        MockCarlaClient::with_config(MockConfig {
            sensor: MockSensorConfig {
                frequency_hz: 40.0,
                image_width: 32,
                image_height: 24,
                ..Default::default()
            },
            ..Default::default()
        })
    }

    fn files_in(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    /// End-to-end test: MockCarlaClient -> SessionSpawner -> Recorder -> disk
    ///
    /// 验证完整的输出目录布局：
    /// 1. 每个传感器目录都有按帧命名的文件
    /// 2. 雷达 CSV 带表头
    /// 3. GIF 与最终速度日志存在
    /// 4. 所有 actors 被销毁
    #[tokio::test]
    async fn test_e2e_full_session_layout() {
        init_tracing();
        let dir = tempdir().unwrap();
        let root = dir.path();
        let bp = short_session(root, SessionBlueprint::full());

        // Stale output from a previous run must be cleared
        fs::create_dir_all(root.join(RGB_DIR)).unwrap();
        fs::write(root.join(RGB_DIR).join("rgb_999999.png"), b"stale").unwrap();

        let session = Session::connect(mock_client(), bp.clone()).await.unwrap();
        let stats = session.run(std::future::pending()).await.unwrap();

        for folder in [
            RGB_DIR,
            DEPTH_PNG_DIR,
            DEPTH_NPY_DIR,
            SEGMENTATION_DIR,
            SEGMENTATION_NPY_DIR,
            DVS_NPY_DIR,
            GIF_FRAMES_DIR,
        ] {
            let files = files_in(&root.join(folder));
            assert!(!files.is_empty(), "{folder} is empty");
        }
        assert!(!root.join(RGB_DIR).join("rgb_999999.png").exists());

        let rgb_files = files_in(&root.join(RGB_DIR));
        assert!(rgb_files.iter().all(|f| f.starts_with("rgb_") && f.ends_with(".png")));
        let depth_npy = files_in(&root.join(DEPTH_NPY_DIR));
        assert!(depth_npy.iter().all(|f| f.starts_with("depth_") && f.ends_with(".npy")));

        let mut reader = csv::Reader::from_path(root.join(RADAR_DIR).join(RADAR_CSV)).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(
            headers.iter().collect::<Vec<_>>(),
            vec!["frame", "object_id", "depth", "velocity", "azimuth", "altitude"]
        );
        assert!(reader.records().count() > 0);

        let velocity = fs::read_to_string(root.join(&bp.output.velocity_file)).unwrap();
        assert!(velocity.starts_with("Final crash velocity: "));
        assert!(velocity.trim_end().ends_with(" m/s"));

        let gif_path = root.join(&bp.output.gif.file_name);
        assert!(gif_path.exists());
        assert!(stats.recording.gif_frames > 0);
        assert!(stats.recording.gif_frames <= bp.output.gif.frame_count);
        let gif = image::open(&gif_path).unwrap();
        assert_eq!((gif.width(), gif.height()), (32, 24));

        assert_eq!(stats.recording.total_failed(), 0);
        assert_eq!(session.client().actor_count(), 0);
    }

    #[tokio::test]
    async fn test_e2e_basic_profile() {
        init_tracing();
        let dir = tempdir().unwrap();
        let root = dir.path();
        let bp = short_session(root, SessionBlueprint::basic());

        let session = Session::connect(mock_client(), bp.clone()).await.unwrap();
        let stats = session.run(std::future::pending()).await.unwrap();

        assert_eq!(stats.active_sensors, 4);
        assert!(stats.final_speed_mps.is_none());
        assert!(!root.join(RADAR_DIR).exists());
        assert!(!root.join(GIF_FRAMES_DIR).exists());
        assert!(!root.join(&bp.output.gif.file_name).exists());
        assert!(!root.join(&bp.output.velocity_file).exists());
        assert!(!files_in(&root.join(DVS_NPY_DIR)).is_empty());
    }

    #[tokio::test]
    async fn test_e2e_frames_share_numbering_across_sensors() {
        init_tracing();
        let dir = tempdir().unwrap();
        let root = dir.path();
        let mut bp = short_session(root, SessionBlueprint::full());
        bp.sensors
            .retain(|s| matches!(s.kind, SensorKind::Depth | SensorKind::SemanticSegmentation));
        bp.output.gif.enabled = false;
        bp.crash.enabled = false;

        let session = Session::connect(mock_client(), bp).await.unwrap();
        session.run(std::future::pending()).await.unwrap();

        // depth and segmentation write a PNG and an npy per frame
        let pngs = files_in(&root.join(DEPTH_PNG_DIR)).len();
        let npys = files_in(&root.join(DEPTH_NPY_DIR)).len();
        assert_eq!(pngs, npys);
        let seg_pngs = files_in(&root.join(SEGMENTATION_DIR)).len();
        let seg_npys = files_in(&root.join(SEGMENTATION_NPY_DIR)).len();
        assert_eq!(seg_pngs, seg_npys);
    }
}

#[cfg(all(test, feature = "real-carla"))]
mod real_carla_tests {
    use actor_factory::RealCarlaClient;
    use carla_recorder::Session;
    use contracts::SessionBlueprint;
    use tempfile::tempdir;

    #[tokio::test]
    #[ignore = "requires CARLA server"]
    async fn test_real_session_smoke() {
        let dir = tempdir().unwrap();
        let mut bp = SessionBlueprint::full();
        bp.output.root = dir.path().to_path_buf();
        bp.recording.duration_sec = 5.0;

        let session = Session::connect(RealCarlaClient::new(), bp).await.unwrap();
        let stats = session.run(std::future::pending()).await.unwrap();
        assert!(stats.recording.total_written() > 0);
    }
}
