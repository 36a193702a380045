use qit::config::{Config, Settings};
use secrecy::ExposeSecret;
use std::time::Duration;

#[test]
fn empty_config_uses_defaults() {
    let config = Config::from_toml_str("").unwrap();
    assert_eq!(config.redis.host, "localhost");
    assert_eq!(config.redis.port, 6379);
    assert_eq!(config.redis.db, 0);
    assert!(config.redis.password.is_none());
    assert_eq!(config.queue_hash_map, "AutoCITIQueue");
    assert_eq!(config.job_tracker_hash_map, "AutoCITIJobTracker");
    assert_eq!(
        config.priority_levels.iter().collect::<Vec<_>>(),
        vec!["High", "Low"]
    );
    assert_eq!(config.queue_name_template.render("q", "High"), "q_High");
    assert_eq!(config.log_level, "info");
}

#[test]
fn config_file_sections_are_read() {
    let config = Config::from_toml_str(
        r#"
        [RedisServer]
        Host = "redis.internal"
        Port = 6380
        DB = "3"
        Password = "hunter2"
        TimeoutSecs = 2

        [RedisHashMaps]
        AutoCITIQueueHashMap = "Queues"
        AutoCITIJobTrackerHashMap = ""

        [QueueInfo]
        PriorityLevels = "P0;P1;P2"

        [Custom]
        Flag = true
        "#,
    )
    .unwrap();

    assert_eq!(config.redis.host, "redis.internal");
    assert_eq!(config.redis.port, 6380);
    assert_eq!(config.redis.db, 3);
    assert_eq!(config.redis.timeout, Duration::from_secs(2));
    assert_eq!(
        config.redis.password.as_ref().map(|p| p.expose_secret().to_string()),
        Some("hunter2".to_string())
    );
    assert_eq!(config.queue_hash_map, "Queues");
    // Empty values fall back to the default.
    assert_eq!(config.job_tracker_hash_map, "AutoCITIJobTracker");
    assert_eq!(config.priority_levels.len(), 3);
    assert_eq!(config.setting("Custom", "Flag").as_deref(), Some("true"));
    assert_eq!(config.setting("Custom", "Missing"), None);
}

#[test]
fn password_is_not_in_debug_output() {
    let config = Config::from_toml_str(
        r#"
        [RedisServer]
        Password = "hunter2"
        "#,
    )
    .unwrap();
    assert!(!format!("{config:?}").contains("hunter2"));
}

#[test]
fn bad_values_are_config_errors() {
    assert!(Config::from_toml_str("[RedisServer]\nPort = \"not-a-port\"").is_err());
    assert!(Config::from_toml_str("[QueueInfo]\nQueueNameTemplate = \"%s\"").is_err());
    assert!(Config::from_toml_str("[QueueInfo]\nPriorityLevels = \"A;A\"").is_err());
    assert!(Config::from_toml_str("not = [valid").is_err());
}

#[test]
fn overrides_win_over_file_values() {
    let mut settings = Settings::parse("[RedisServer]\nHost = \"from-file\"").unwrap();
    settings.apply_overrides([
        ("QIT_REDIS_HOST", "from-env"),
        ("QIT_PRIORITY_LEVELS", "Urgent;Normal"),
        ("UNRELATED", "ignored"),
    ]);
    let config = Config::from_settings(settings).unwrap();
    assert_eq!(config.redis.host, "from-env");
    assert!(config.priority_levels.contains("Urgent"));
    assert_eq!(config.setting("UNRELATED", "UNRELATED"), None);
}

#[test]
fn load_reads_file_and_creates_log_dir() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("qit.toml");
    std::fs::write(
        &path,
        format!(
            "[General]\nWorkingFolderPath = {:?}\n[Logging]\nLogsFolderName = \"out\"\n",
            dir.path().display().to_string()
        ),
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.working_dir().unwrap(), dir.path());
    let logs = config.log_dir().unwrap();
    assert_eq!(logs, dir.path().join("out"));
    assert!(logs.is_dir());
}

#[test]
fn missing_working_folder_falls_back_to_cwd() {
    let config =
        Config::from_toml_str("[General]\nWorkingFolderPath = \"/definitely/not/here\"").unwrap();
    assert_eq!(
        config.working_dir().unwrap(),
        std::env::current_dir().unwrap()
    );
}

#[test]
fn load_fails_for_missing_file() {
    assert!(Config::load(Some(std::path::Path::new("/no/such/qit.toml"))).is_err());
}
