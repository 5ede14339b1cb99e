use std::sync::Mutex;

use tempfile::NamedTempFile;

use proctord::ProctordConfig;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PROCTOR_CONFIG",
        "PROCTOR_API_ADDR",
        "PROCTOR_CAMERA_URL",
        "PROCTOR_TARGET_FPS",
        "PROCTOR_DETECT_BACKEND",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = ProctordConfig::load().expect("load config");
    assert_eq!(cfg.api_addr, "127.0.0.1:5000");
    assert_eq!(cfg.camera.url, "stub://webcam");
    assert_eq!(cfg.camera.target_fps, 10);
    assert_eq!(cfg.camera.width, 640);
    assert_eq!(cfg.camera.height, 480);
    assert_eq!(cfg.detection.backend, "stub");
    assert_eq!(cfg.detection.confidence_threshold, 0.5);
    assert_eq!(
        cfg.detection.prohibited_classes,
        vec!["cell phone", "book", "laptop"]
    );
    assert_eq!(cfg.detection.scale_factor, 1.1);
    assert_eq!(cfg.detection.min_neighbors, 4);
}

#[test]
fn loads_config_from_file_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "api": { "addr": "0.0.0.0:9000" },
        "camera": {
            "url": "stub://exam_hall",
            "target_fps": 12,
            "width": 800,
            "height": 600
        },
        "detection": {
            "backend": "stub",
            "confidence_threshold": 0.6,
            "prohibited_classes": ["cell phone", "book"],
            "min_neighbors": 3
        }
    }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");

    std::env::set_var("PROCTOR_CONFIG", file.path());
    std::env::set_var("PROCTOR_CAMERA_URL", "stub://override");
    std::env::set_var("PROCTOR_TARGET_FPS", "5");

    let cfg = ProctordConfig::load().expect("load config");
    assert_eq!(cfg.api_addr, "0.0.0.0:9000");
    // Env wins over the file.
    assert_eq!(cfg.camera.url, "stub://override");
    assert_eq!(cfg.camera.target_fps, 5);
    // File wins over defaults.
    assert_eq!(cfg.camera.width, 800);
    assert_eq!(cfg.detection.confidence_threshold, 0.6);
    assert_eq!(cfg.detection.prohibited_classes, vec!["cell phone", "book"]);
    assert_eq!(cfg.detection.min_neighbors, 3);
    // Untouched fields keep their defaults.
    assert_eq!(cfg.detection.scale_factor, 1.1);

    clear_env();
}

#[test]
fn rejects_out_of_range_threshold() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{ "detection": { "confidence_threshold": 1.5 } }"#;
    std::io::Write::write_all(&mut file, json.as_bytes()).expect("write config");
    std::env::set_var("PROCTOR_CONFIG", file.path());

    assert!(ProctordConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_unknown_backend() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PROCTOR_DETECT_BACKEND", "opencv");
    assert!(ProctordConfig::load().is_err());
    clear_env();
}

#[test]
fn tract_backend_requires_model_paths() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PROCTOR_DETECT_BACKEND", "tract");
    assert!(ProctordConfig::load().is_err());
    clear_env();
}

#[test]
fn rejects_malformed_fps() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PROCTOR_TARGET_FPS", "fast");
    assert!(ProctordConfig::load().is_err());
    clear_env();
}
