use std::time::Duration;

use chrono::{Duration as ChronoDuration, Utc};
use metareserve::domain::rms::simulated_backend::SimulatedBackend;
use metareserve::domain::utils::id::BackendId;
use metareserve::error::Error;
use metareserve::{Node, Reservation, ReservationInterface, ReservationRequest, ReservationStatus, TimeSlotReservationRequest};

fn mock_backend(delay_ms: u64) -> SimulatedBackend {
    let nodes = vec![
        (Node::new(1, "ams-1"), "ams".to_string()),
        (Node::new(2, "ams-2"), "ams".to_string()),
        (Node::new(3, "fra-1"), "fra".to_string()),
    ];
    SimulatedBackend::new(BackendId::new("test-cluster"), Duration::from_millis(delay_ms), nodes).expect("Failed to create backend")
}

#[test]
fn test_reserve_and_stop_round_trip() {
    let backend = mock_backend(50);
    assert_eq!(backend.free_nodes(), 3);

    let wait = backend.reserve(ReservationRequest::new(2, 30).into()).unwrap();
    let reservation = wait.get(true).unwrap().unwrap();
    wait.shutdown();

    assert_eq!(reservation.len(), 2);
    assert_eq!(backend.free_nodes(), 1);

    backend.stop_reservation(&reservation).unwrap();
    assert_eq!(backend.free_nodes(), 3);
}

#[test]
fn test_reserve_returns_before_allocation() {
    let backend = mock_backend(1000);
    let wait = backend.reserve(ReservationRequest::new(1, 30).into()).unwrap();

    assert_eq!(wait.status(), ReservationStatus::Pending);
    assert!(wait.get(false).unwrap().is_none());
    assert_eq!(backend.free_nodes(), 3);
    wait.shutdown();
}

#[test]
fn test_location_is_honoured() {
    let backend = mock_backend(0);
    let wait = backend.reserve(ReservationRequest::new(1, 30).with_location("fra").into()).unwrap();
    let reservation = wait.get(true).unwrap().unwrap();
    wait.shutdown();

    assert_eq!(reservation.get_node(None, Some("fra-1")).unwrap().node_id(), 3);
}

#[test]
fn test_exhausted_pool_fails_on_get() {
    let backend = mock_backend(0);
    let wait = backend.reserve(ReservationRequest::new(3, 30).with_location("ams").into()).unwrap();

    let err = wait.get(true).unwrap_err();
    assert!(err.is_reservation_failed());
    assert!(err.to_string().contains("only 2 free"));
    assert_eq!(wait.status(), ReservationStatus::Failed);
    assert_eq!(backend.free_nodes(), 3);
    wait.shutdown();
}

#[test]
fn test_time_slot_request() {
    let backend = mock_backend(0);
    let start = Utc::now();
    let request = TimeSlotReservationRequest::new(3, start, start + ChronoDuration::hours(2));

    let wait = backend.reserve(request.into()).unwrap();
    assert_eq!(wait.get(true).unwrap().unwrap().len(), 3);
    assert_eq!(backend.free_nodes(), 0);
    wait.shutdown();
}

#[test]
fn test_invalid_request_is_rejected_synchronously() {
    let backend = mock_backend(0);
    assert!(matches!(backend.reserve(ReservationRequest::new(0, 30).into()), Err(Error::InvalidArgument(_))));

    let start = Utc::now();
    let backwards = TimeSlotReservationRequest::new(1, start, start - ChronoDuration::minutes(1));
    assert!(matches!(backend.reserve(backwards.into()), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_stop_foreign_reservation_is_not_found() {
    let backend = mock_backend(0);
    let foreign = Reservation::new(vec![Node::new(99, "elsewhere")]);

    assert!(matches!(backend.stop_reservation(&foreign), Err(Error::NotFound(_))));
    assert_eq!(backend.free_nodes(), 3);
}

#[test]
fn test_stop_twice_is_tolerated() {
    let backend = mock_backend(0);
    let wait = backend.reserve(ReservationRequest::new(1, 30).into()).unwrap();
    let reservation = wait.get(true).unwrap().unwrap();
    wait.shutdown();

    backend.stop_reservation(&reservation).unwrap();
    backend.stop_reservation(&reservation).unwrap();
    assert_eq!(backend.free_nodes(), 3);
}

#[test]
fn test_duplicate_pool_nodes_are_rejected() {
    let nodes = vec![(Node::new(1, "a"), String::new()), (Node::new(1, "b"), String::new())];
    assert!(matches!(SimulatedBackend::new(BackendId::new("dup"), Duration::ZERO, nodes), Err(Error::InvalidArgument(_))));
}

#[test]
fn test_concurrent_waits_never_share_nodes() {
    let backend = mock_backend(20);
    let first = backend.reserve(ReservationRequest::new(2, 30).into()).unwrap();
    let second = backend.reserve(ReservationRequest::new(2, 30).into()).unwrap();

    let results = [first.get(true), second.get(true)];
    let granted: Vec<_> = results.iter().filter_map(|result| result.as_ref().ok().cloned().flatten()).collect();
    let failed = results.iter().filter(|result| result.is_err()).count();

    assert_eq!(granted.len(), 1);
    assert_eq!(failed, 1);
    assert_eq!(backend.free_nodes(), 1);

    first.shutdown();
    second.shutdown();
}
