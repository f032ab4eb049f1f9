mod common;

use applab_broker::{BrokerError, ResourceBroker};
use applab_common::TemplateType;
use common::{request, set, Behavior, Call, MockBroker};
use std::sync::atomic::Ordering;

#[tokio::test]
async fn falls_back_to_next_backend_after_failure() {
    let broker = ResourceBroker::new(
        MockBroker::new()
            .backend("A", Behavior::Fail("quota exceeded".to_string()))
            .backend(
                "B",
                Behavior::Succeed {
                    pool_id: "p1".to_string(),
                    members: 3,
                },
            ),
    );

    let pool = broker.acquire(&request(3), &set(&["A", "B"])).await.unwrap();

    assert_eq!(pool.pool_id().as_str(), "p1");
    assert_eq!(pool.len(), 3);
    assert_eq!(pool.backend(), "B");
    assert_eq!(pool.failures().len(), 1);
    assert_eq!(pool.failures()[0].backend, "A");
    assert!(pool.failures()[0].error.contains("quota exceeded"));
    assert_eq!(broker.api().provisions(), vec!["A", "B"]);
    assert_eq!(broker.api().requests(), vec![request(3), request(3)]);
    assert_eq!(pool.template_type(), TemplateType::VirtualMachine);
}

#[tokio::test]
async fn stops_after_first_success() {
    let broker = ResourceBroker::new(
        MockBroker::new()
            .backend(
                "A",
                Behavior::Succeed {
                    pool_id: "p1".to_string(),
                    members: 1,
                },
            )
            .backend(
                "B",
                Behavior::Succeed {
                    pool_id: "p2".to_string(),
                    members: 1,
                },
            ),
    );

    let pool = broker.acquire(&request(1), &set(&["B", "A"])).await.unwrap();

    // sorted candidate order, so A is tried first and B never
    assert_eq!(pool.pool_id().as_str(), "p1");
    assert_eq!(broker.api().provisions(), vec!["A"]);
    assert!(pool.failures().is_empty());
}

#[tokio::test]
async fn exhausting_every_backend_is_fatal() {
    let broker = ResourceBroker::new(
        MockBroker::new()
            .backend("A", Behavior::Fail("down".to_string()))
            .backend("B", Behavior::Fail("down".to_string()))
            .backend("C", Behavior::Fail("down".to_string())),
    );

    let err = broker
        .acquire(&request(1), &set(&["A", "B", "C"]))
        .await
        .unwrap_err();

    match err {
        BrokerError::NoProvisionAvailable { attempted } => {
            let tried: Vec<&str> = attempted.iter().map(|a| a.backend.as_str()).collect();
            assert_eq!(tried, vec!["A", "B", "C"]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(broker.api().provisions(), vec!["A", "B", "C"]);
    assert!(broker.api().destroys().is_empty());
}

#[tokio::test]
async fn empty_candidate_set_is_fatal() {
    let broker = ResourceBroker::new(MockBroker::new());

    let err = broker.acquire(&request(1), &set(&[])).await.unwrap_err();

    assert!(matches!(err, BrokerError::NoProvisionAvailable { ref attempted } if attempted.is_empty()));
    assert!(broker.api().calls().is_empty());
}

#[tokio::test]
async fn short_pool_is_destroyed_and_next_backend_tried() {
    let broker = ResourceBroker::new(
        MockBroker::new()
            .backend(
                "A",
                Behavior::Succeed {
                    pool_id: "short".to_string(),
                    members: 2,
                },
            )
            .backend(
                "B",
                Behavior::Succeed {
                    pool_id: "full".to_string(),
                    members: 3,
                },
            ),
    );

    let pool = broker.acquire(&request(3), &set(&["A", "B"])).await.unwrap();

    assert_eq!(pool.pool_id().as_str(), "full");
    assert_eq!(pool.len(), 3);
    assert_eq!(broker.api().destroys(), vec!["short"]);
}

#[tokio::test]
async fn usable_backends_is_the_intersection() {
    let broker = ResourceBroker::new(
        MockBroker::new()
            .backend("rhv-fqdn", Behavior::Fail("x".to_string()))
            .backend("ec2", Behavior::Fail("x".to_string())),
    );

    let usable = broker
        .usable_backends(&set(&["rhv-fqdn", "vsphere-fqdn"]))
        .await
        .unwrap();

    assert_eq!(usable, set(&["rhv-fqdn"]));
    assert_eq!(broker.api().calls(), vec![Call::Available]);
}

#[tokio::test]
async fn release_closes_sessions_then_destroys_once() {
    let broker = ResourceBroker::new(MockBroker::new().backend(
        "A",
        Behavior::Succeed {
            pool_id: "p1".to_string(),
            members: 3,
        },
    ));

    let pool = broker.acquire(&request(3), &set(&["A"])).await.unwrap();
    broker.release(pool).await.unwrap();

    assert_eq!(broker.api().sessions_closed.load(Ordering::SeqCst), 3);
    assert_eq!(broker.api().destroys(), vec!["p1"]);
}

#[tokio::test]
async fn session_close_failures_do_not_block_destroy() {
    let mut mock = MockBroker::new().backend(
        "A",
        Behavior::Succeed {
            pool_id: "p1".to_string(),
            members: 2,
        },
    );
    mock.failing_sessions = true;
    let broker = ResourceBroker::new(mock);

    let pool = broker.acquire(&request(2), &set(&["A"])).await.unwrap();
    broker.release(pool).await.unwrap();

    assert_eq!(broker.api().sessions_closed.load(Ordering::SeqCst), 2);
    assert_eq!(broker.api().destroys(), vec!["p1"]);
}

#[tokio::test]
async fn destroy_failure_is_reported() {
    let mut mock = MockBroker::new().backend(
        "A",
        Behavior::Succeed {
            pool_id: "p1".to_string(),
            members: 1,
        },
    );
    mock.destroy_fails = true;
    let broker = ResourceBroker::new(mock);

    let pool = broker.acquire(&request(1), &set(&["A"])).await.unwrap();
    let err = broker.release(pool).await.unwrap_err();

    assert!(matches!(err, BrokerError::Rpc { .. }));
}
