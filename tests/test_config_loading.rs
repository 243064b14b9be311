use std::fs;
use std::path::PathBuf;

use metareserve::error::Error;
use metareserve::{ReservationInterface, ReservationRequestKind, load_simulated_setup};

fn write_config(contents: &str) -> PathBuf {
    let path = std::env::temp_dir().join(format!("metareserve-{}.json", uuid::Uuid::new_v4()));
    fs::write(&path, contents).expect("Failed to write test config");
    path
}

const CONFIG: &str = r#"{
    "backend": {
        "id": "test-cluster",
        "nodes": [
            { "nodeId": 1, "hostname": "node001", "ipLocal": "10.0.0.1", "location": "ams" },
            { "nodeId": 2, "hostname": "node002", "port": 2222, "extraInfo": { "gpu": "a100" } }
        ]
    },
    "request": { "numNodes": 2, "durationMinutes": 15 }
}"#;

#[test]
fn test_load_simulated_setup() {
    let path = write_config(CONFIG);
    let (backend, request, wait_settings) = load_simulated_setup(path.to_str().unwrap()).unwrap();
    fs::remove_file(&path).ok();

    assert_eq!(backend.id().to_string(), "test-cluster");
    assert_eq!(backend.total_nodes(), 2);
    assert!(matches!(request, ReservationRequestKind::Duration(_)));
    assert_eq!(wait_settings.timeout_seconds, 30);
    assert_eq!(wait_settings.request_sleep_period, 5);

    let wait = backend.reserve(request).unwrap();
    let reservation = wait.get(true).unwrap().unwrap();
    wait.shutdown();

    let gpu_node = reservation.get_node(Some(2), None).unwrap();
    assert_eq!(gpu_node.port(), 2222);
    assert_eq!(gpu_node.extra_info().get("gpu").map(String::as_str), Some("a100"));
    assert_eq!(reservation.get_node_by_id(1).unwrap().port(), 22);
    assert_eq!(reservation.to_string(), "1|node001|10.0.0.1||22|\n2|node002|||2222|gpu=a100");
}

#[test]
fn test_missing_file_is_io_error() {
    let result = load_simulated_setup("/nonexistent/metareserve/config.json");
    assert!(matches!(result, Err(Error::IoError(_))));
}

#[test]
fn test_malformed_json_is_deserialization_error() {
    let path = write_config("{ \"backend\": ");
    let result = load_simulated_setup(path.to_str().unwrap());
    fs::remove_file(&path).ok();

    assert!(matches!(result, Err(Error::DeserializationError(_))));
}
