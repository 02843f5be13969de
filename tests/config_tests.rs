//! Config file loading.

use std::io::Write;

use spectro_view::mipmap::FreqScale;
use spectro_view::{ConfigError, ViewerConfig};

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"{{ "max_texture_size": 4096, "freq_scale": "mel", "worker_count": 2 }}"#
    )
    .unwrap();

    let config = ViewerConfig::load(file.path()).unwrap();
    assert_eq!(config.max_texture_size, 4096);
    assert_eq!(config.freq_scale, FreqScale::Mel);
    assert_eq!(config.worker_count, Some(2));
    assert_eq!(config.hq_debounce_ms, 100);
}

#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let err = ViewerConfig::load(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn test_malformed_json() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "{{ not json").unwrap();
    assert!(matches!(
        ViewerConfig::load(file.path()).unwrap_err(),
        ConfigError::Parse(_)
    ));
}

#[test]
fn test_round_trip_through_serde() {
    let config = ViewerConfig {
        margin_px: 8,
        ..Default::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(ViewerConfig::from_json_str(&json).unwrap(), config);
}
