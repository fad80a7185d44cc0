use hidromon_config::AppConfig;

// 环境变量是进程级全局，串行放在同一个用例里避免并发读写竞争。
#[test]
fn load_config_from_env() {
    // Rust 2024 中 set_var 需要显式标注 unsafe（测试进程内可控）。
    unsafe {
        std::env::set_var("HIDRO_HTTP_ADDR", "127.0.0.1:8081");
        std::env::set_var("HIDRO_POLL_INTERVAL_MS", "2500");
        std::env::set_var("HIDRO_STALENESS_WINDOW_MS", "9000");
        std::env::set_var("HIDRO_MAX_DEVICES_PER_ORG", "3");
    }

    let config = AppConfig::from_env().expect("config");
    assert_eq!(config.http_addr, "127.0.0.1:8081");
    assert_eq!(config.poll_interval_ms, 2500);
    assert_eq!(config.staleness_window_ms, 9000);
    assert_eq!(config.max_devices_per_org, Some(3));
    assert_eq!(config.mqtt_topic_pattern, "predio/+/+/telemetry");

    unsafe {
        std::env::set_var("HIDRO_MQTT_PORT", "not-a-port");
    }
    let err = AppConfig::from_env().expect_err("invalid port");
    assert!(err.to_string().contains("HIDRO_MQTT_PORT"));
    unsafe {
        std::env::remove_var("HIDRO_MQTT_PORT");
    }
}
