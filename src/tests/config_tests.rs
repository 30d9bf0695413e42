use crate::config::AppConfig;

#[test]
fn test_parse_ini() {
    let mut config = AppConfig::default();
    let ini = r#"
# comment
SAFETY_MARGIN="10737418240"
SCAN_THREADS="4"
EXCLUDED_DISKS="disk3, cache"
RESERVED_PREFIXES="@,.,_"
VERIFY_CHECKSUM="no"
LOG_FILE="/tmp/consld8_execution.log"
UNKNOWN_KEY="ignored"
"#;
    config.parse_ini(ini);
    assert_eq!(config.safety_margin, 10_737_418_240);
    assert_eq!(config.scan_threads, 4);
    assert!(config.excluded_disks.contains("disk3"));
    assert!(config.excluded_disks.contains("cache"));
    assert_eq!(config.reserved_prefixes, vec!["@", ".", "_"]);
    assert!(!config.verify_checksum);
    assert_eq!(config.log_file.as_deref(), Some("/tmp/consld8_execution.log"));
}

#[test]
fn test_parse_ini_keeps_defaults_on_bad_numbers() {
    let mut config = AppConfig::default();
    config.parse_ini("SAFETY_MARGIN=\"lots\"\nSCAN_THREADS=\"-1\"\nLOG_FILE=\"\"");
    assert_eq!(config.safety_margin, 0);
    assert_eq!(config.scan_threads, AppConfig::default().scan_threads);
    assert_eq!(config.log_file, None);
}

#[test]
fn test_default_config_validates() {
    let config = AppConfig::default();
    assert!(config.validate().is_ok());
}

#[test]
fn test_validate_rejects_bad_values() {
    let config = AppConfig { scan_threads: 0, ..AppConfig::default() };
    assert!(config.validate().is_err());

    let config = AppConfig { mnt_base: "/mnt/user".to_string(), ..AppConfig::default() };
    assert!(config.validate().is_err());

    let config = AppConfig { reserved_prefixes: Vec::new(), ..AppConfig::default() };
    assert!(config.validate().is_err());
}

#[test]
fn test_save_round_trips_through_parse() {
    let dir = tempfile::TempDir::new().unwrap();
    let mut config = AppConfig {
        config_path: dir.path().join("plugin/consld8.cfg").to_string_lossy().to_string(),
        safety_margin: 1024,
        verify_checksum: false,
        ..AppConfig::default()
    };
    config.excluded_disks.insert("disk7".to_string());
    config.save().unwrap();

    let mut loaded = AppConfig::default();
    loaded.parse_ini(&std::fs::read_to_string(&config.config_path).unwrap());
    assert_eq!(loaded.safety_margin, 1024);
    assert!(!loaded.verify_checksum);
    assert!(loaded.excluded_disks.contains("disk7"));
    assert_eq!(loaded.log_file, None);
}
