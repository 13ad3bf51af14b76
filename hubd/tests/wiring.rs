use hubd::config::Config;
use hubd::wiring::build_state;

#[tokio::test]
async fn builds_with_no_configured_protocols() {
    let cfg = Config::default();
    let state = build_state(&cfg).await.unwrap();
    assert!(state.manager.handler_names().is_empty());
    assert!(state.manager.devices().is_empty());
}

#[tokio::test]
async fn loads_mqtt_handler_from_config() {
    let mut cfg = Config::default();
    cfg.protocols.insert("mqtt".to_string(), serde_json::json!({"host": "127.0.0.1", "port": 18830}));
    let state = build_state(&cfg).await.unwrap();
    assert_eq!(state.manager.handler_names(), vec!["mqtt".to_string()]);
}
