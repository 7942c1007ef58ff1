//! Tests for the queue engine and registry

use super::*;
use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::time::Duration;
use tokio::time::Instant;

fn queue() -> Queue {
    Queue::new("q", "http://localhost:9324/123/q", DEFAULT_QUEUE_CAPACITY)
}

fn body_of(delivery: &Delivery) -> String {
    delivery.message.body_text().into_owned()
}

// =============================================================================
// ENQUEUE / FRONT
// =============================================================================

mod receive_tests {
    use super::*;

    #[test]
    fn test_front_on_empty_queue() {
        let q = queue();
        assert!(q.front().unwrap().is_none());
    }

    #[test]
    fn test_fifo_order() {
        let q = queue();
        let bodies: Vec<String> = (0..50).map(|i| format!("message-{}", i)).collect();
        for b in &bodies {
            q.enqueue(b.clone()).unwrap();
        }

        let received: Vec<String> = (0..bodies.len())
            .map(|_| body_of(&q.front().unwrap().unwrap()))
            .collect();
        assert_eq!(received, bodies);
        assert!(q.front().unwrap().is_none());
    }

    #[test]
    fn test_two_messages_then_empty() {
        let q = queue();
        q.enqueue("a").unwrap();
        q.enqueue("b").unwrap();

        assert_eq!(body_of(&q.front().unwrap().unwrap()), "a");
        assert_eq!(body_of(&q.front().unwrap().unwrap()), "b");
        assert!(q.front().unwrap().is_none());
    }

    #[test]
    fn test_enqueue_returns_message_id() {
        let q = queue();
        let id = q.enqueue("hello").unwrap();
        let delivery = q.front().unwrap().unwrap();
        assert_eq!(delivery.message.id(), id);
    }

    #[test]
    fn test_delivery_moves_message_in_flight() {
        let q = queue();
        q.enqueue("hello").unwrap();
        assert_eq!(q.pending_len(), 1);
        assert_eq!(q.in_flight_len(), 0);

        let delivery = q.front().unwrap().unwrap();
        assert_eq!(q.pending_len(), 0);
        assert_eq!(q.in_flight_len(), 1);
        assert_eq!(delivery.message.receive_count(), 1);
        assert_eq!(delivery.message.handles(), &[delivery.receipt_handle.clone()]);
    }

    #[test]
    fn test_capacity_exceeded() {
        let q = Queue::new("small", "http://localhost:9324/123/small", 2);
        q.enqueue("1").unwrap();
        q.enqueue("2").unwrap();

        let result = q.enqueue("3");
        assert!(matches!(
            result,
            Err(SqsError::CapacityExceeded { capacity: 2, .. })
        ));

        // Room again once a message is delivered
        q.front().unwrap().unwrap();
        q.enqueue("3").unwrap();
        assert_eq!(q.pending_len(), 2);
    }

    #[test]
    fn test_binary_body_round_trips() {
        let q = queue();
        let payload = bytes::Bytes::from_static(&[0, 159, 146, 150, 255]);
        q.enqueue(payload.clone()).unwrap();
        let delivery = q.front().unwrap().unwrap();
        assert_eq!(delivery.message.body(), &payload);
    }
}

// =============================================================================
// DELETE
// =============================================================================

mod delete_tests {
    use super::*;

    #[test]
    fn test_hello_scenario() {
        let q = queue();
        assert!(q.front().unwrap().is_none());

        q.enqueue("hello").unwrap();
        let delivery = q.front().unwrap().unwrap();
        assert_eq!(body_of(&delivery), "hello");
        assert!(!delivery.receipt_handle.is_empty());

        assert!(q.front().unwrap().is_none());

        q.delete(&delivery.receipt_handle).unwrap();
        let again = q.delete(&delivery.receipt_handle);
        assert!(matches!(again, Err(SqsError::InvalidReceiptHandle(_))));
        assert_eq!(q.in_flight_len(), 0);
    }

    #[test]
    fn test_unknown_handle_leaves_in_flight_untouched() {
        let q = queue();
        q.enqueue("one").unwrap();
        q.enqueue("two").unwrap();
        let d1 = q.front().unwrap().unwrap();
        let d2 = q.front().unwrap().unwrap();

        let result = q.delete("0123456789abcdef");
        assert!(matches!(result, Err(SqsError::InvalidReceiptHandle(_))));
        assert_eq!(q.in_flight_len(), 2);

        q.delete(&d1.receipt_handle).unwrap();
        q.delete(&d2.receipt_handle).unwrap();
        assert_eq!(q.in_flight_len(), 0);
    }

    #[test]
    fn test_handle_from_other_queue_is_invalid() {
        let q1 = queue();
        let q2 = Queue::new("other", "http://localhost:9324/123/other", 10);
        q1.enqueue("x").unwrap();
        let delivery = q1.front().unwrap().unwrap();

        let result = q2.delete(&delivery.receipt_handle);
        assert!(matches!(result, Err(SqsError::InvalidReceiptHandle(_))));

        // Still deletable on its own queue
        q1.delete(&delivery.receipt_handle).unwrap();
    }

    #[test]
    fn test_empty_handle_is_invalid() {
        let q = queue();
        q.enqueue("x").unwrap();
        q.front().unwrap().unwrap();
        assert!(matches!(
            q.delete(""),
            Err(SqsError::InvalidReceiptHandle(_))
        ));
    }

    #[test]
    fn test_delete_out_of_order() {
        let q = queue();
        let deliveries: Vec<Delivery> = (0..5)
            .map(|i| {
                q.enqueue(format!("m{}", i)).unwrap();
                q.front().unwrap().unwrap()
            })
            .collect();

        for i in [3, 0, 4, 1, 2] {
            q.delete(&deliveries[i].receipt_handle).unwrap();
            assert!(q.delete(&deliveries[i].receipt_handle).is_err());
        }
        assert_eq!(q.in_flight_len(), 0);
    }

    #[test]
    fn test_batch_delete_attempts_every_entry() {
        let q = queue();
        for b in ["a", "b"] {
            q.enqueue(b).unwrap();
        }
        let h1 = q.front().unwrap().unwrap().receipt_handle;
        let h3 = q.front().unwrap().unwrap().receipt_handle;

        let results = q.delete_batch(&[h1.as_str(), "bogus", h3.as_str()]);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(SqsError::InvalidReceiptHandle(ref h)) if h == "bogus"));
        assert!(results[2].is_ok());
        assert_eq!(q.in_flight_len(), 0);
    }

    #[test]
    fn test_batch_delete_repeated_handle() {
        let q = queue();
        q.enqueue("a").unwrap();
        let h = q.front().unwrap().unwrap().receipt_handle;

        let results = q.delete_batch(&[h.clone(), h]);
        assert!(results[0].is_ok());
        assert!(results[1].is_err());
    }

    #[test]
    fn test_batch_delete_empty() {
        let q = queue();
        let handles: Vec<String> = Vec::new();
        assert!(q.delete_batch(&handles).is_empty());
    }
}

// =============================================================================
// LONG POLLING
// =============================================================================

mod wait_tests {
    use super::*;

    #[tokio::test]
    async fn test_wait_times_out_on_empty_queue() {
        let q = queue();
        let timeout = Duration::from_millis(200);

        let start = Instant::now();
        let result = q.front_wait(timeout).await.unwrap();
        let elapsed = start.elapsed();

        assert!(result.is_none());
        assert!(elapsed >= timeout, "returned early after {:?}", elapsed);
        assert!(elapsed < timeout + Duration::from_millis(500), "overshot: {:?}", elapsed);
    }

    #[tokio::test]
    async fn test_wait_returns_pending_message_immediately() {
        let q = queue();
        q.enqueue("ready").unwrap();

        let start = Instant::now();
        let delivery = q.front_wait(Duration::from_secs(5)).await.unwrap().unwrap();
        assert_eq!(body_of(&delivery), "ready");
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_wait_wakes_on_enqueue() {
        let q = Arc::new(queue());
        let producer = Arc::clone(&q);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.enqueue("zxcv").unwrap();
        });

        let start = Instant::now();
        let delivery = q.front_wait(Duration::from_secs(5)).await.unwrap().unwrap();
        assert_eq!(body_of(&delivery), "zxcv");
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_unbounded_timeout_returns_pending_message() {
        let q = queue();
        q.enqueue("x").unwrap();

        let delivery = q.front_wait(Duration::MAX).await.unwrap().unwrap();
        assert_eq!(body_of(&delivery), "x");
    }

    #[tokio::test]
    async fn test_unbounded_timeout_wakes_on_enqueue() {
        let q = Arc::new(queue());
        let producer = Arc::clone(&q);

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            producer.enqueue("late").unwrap();
        });

        let delivery = tokio::time::timeout(Duration::from_secs(5), q.front_wait(Duration::MAX))
            .await
            .expect("wait was not woken")
            .unwrap()
            .unwrap();
        assert_eq!(body_of(&delivery), "late");
    }

    #[tokio::test]
    async fn test_zero_timeout_behaves_like_front() {
        let q = queue();
        assert!(q.front_wait(Duration::ZERO).await.unwrap().is_none());

        q.enqueue("x").unwrap();
        assert!(q.front_wait(Duration::ZERO).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_cancelled_wait_does_not_swallow_message() {
        let q = queue();

        let cancelled = tokio::time::timeout(
            Duration::from_millis(50),
            q.front_wait(Duration::from_secs(10)),
        )
        .await;
        assert!(cancelled.is_err());

        q.enqueue("after-cancel").unwrap();
        let delivery = q.front().unwrap().unwrap();
        assert_eq!(body_of(&delivery), "after-cancel");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_many_waiters_each_get_one_message() {
        let q = Arc::new(queue());
        let waiters: Vec<_> = (0..8)
            .map(|_| {
                let q = Arc::clone(&q);
                tokio::spawn(async move { q.front_wait(Duration::from_secs(5)).await })
            })
            .collect();

        tokio::time::sleep(Duration::from_millis(50)).await;
        for i in 0..8 {
            q.enqueue(format!("m{}", i)).unwrap();
        }

        let mut ids = HashSet::new();
        for w in waiters {
            let delivery = w.await.unwrap().unwrap().expect("waiter timed out");
            assert!(ids.insert(delivery.message.id().to_string()));
        }
        assert_eq!(ids.len(), 8);
        assert_eq!(q.pending_len(), 0);
        assert_eq!(q.in_flight_len(), 8);
    }
}

// =============================================================================
// CONCURRENCY
// =============================================================================

mod concurrency_tests {
    use super::*;

    #[test]
    fn test_two_receivers_one_message() {
        for _ in 0..100 {
            let q = Arc::new(queue());
            q.enqueue("only").unwrap();
            let barrier = Arc::new(Barrier::new(2));

            let handles: Vec<_> = (0..2)
                .map(|_| {
                    let q = Arc::clone(&q);
                    let barrier = Arc::clone(&barrier);
                    std::thread::spawn(move || {
                        barrier.wait();
                        q.front().unwrap()
                    })
                })
                .collect();

            let got: Vec<Option<Delivery>> =
                handles.into_iter().map(|h| h.join().unwrap()).collect();
            assert_eq!(got.iter().filter(|d| d.is_some()).count(), 1);
        }
    }

    #[test]
    fn test_concurrent_receivers_deliver_each_message_once() {
        let q = Arc::new(queue());
        for i in 0..1000 {
            q.enqueue(format!("m{}", i)).unwrap();
        }

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let q = Arc::clone(&q);
                std::thread::spawn(move || {
                    let mut ids = Vec::new();
                    while let Some(d) = q.front().unwrap() {
                        ids.push(d.message.id().to_string());
                    }
                    ids
                })
            })
            .collect();

        let mut all = HashSet::new();
        for h in handles {
            for id in h.join().unwrap() {
                assert!(all.insert(id), "message delivered twice");
            }
        }
        assert_eq!(all.len(), 1000);
        assert_eq!(q.in_flight_len(), 1000);
    }

    #[test]
    fn test_racing_deletes_succeed_at_most_once() {
        let q = Arc::new(queue());
        q.enqueue("x").unwrap();
        let handle = q.front().unwrap().unwrap().receipt_handle;
        let barrier = Arc::new(Barrier::new(4));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let q = Arc::clone(&q);
                let handle = handle.clone();
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    q.delete(&handle).is_ok()
                })
            })
            .collect();

        let successes = threads
            .into_iter()
            .map(|t| t.join().unwrap())
            .filter(|ok| *ok)
            .count();
        assert_eq!(successes, 1);
    }

    #[test]
    fn test_deletes_concurrent_with_deliveries() {
        let q = Arc::new(queue());
        for i in 0..500 {
            q.enqueue(format!("m{}", i)).unwrap();
        }

        let (tx, rx) = std::sync::mpsc::channel::<String>();
        let receiver = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || {
                while let Some(d) = q.front().unwrap() {
                    tx.send(d.receipt_handle).unwrap();
                }
            })
        };
        let deleter = {
            let q = Arc::clone(&q);
            std::thread::spawn(move || {
                let mut deleted = 0;
                for handle in rx {
                    q.delete(&handle).unwrap();
                    deleted += 1;
                }
                deleted
            })
        };

        receiver.join().unwrap();
        assert_eq!(deleter.join().unwrap(), 500);
        assert_eq!(q.in_flight_len(), 0);
        assert_eq!(q.pending_len(), 0);
    }
}

// =============================================================================
// REGISTRY
// =============================================================================

mod registry_tests {
    use super::*;

    #[test]
    fn test_create_and_lookup() {
        let r = Registry::default();
        let created = r.create("jobs").unwrap();
        assert_eq!(created.url(), "http://localhost:9324/123/jobs");

        let found = r.lookup("jobs").unwrap();
        assert!(Arc::ptr_eq(&created, &found));
    }

    #[test]
    fn test_lookup_missing() {
        let r = Registry::default();
        assert!(matches!(r.lookup("nope"), Err(SqsError::QueueNotFound(ref n)) if n == "nope"));
    }

    #[test]
    fn test_recreate_yields_empty_queue() {
        let r = Registry::default();
        let old = r.create("jobs").unwrap();
        old.enqueue("stale").unwrap();

        let fresh = r.create("jobs").unwrap();
        assert!(!Arc::ptr_eq(&old, &fresh));
        assert_eq!(fresh.pending_len(), 0);
        assert!(r.lookup("jobs").unwrap().front().unwrap().is_none());
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn test_list_is_sorted_snapshot() {
        let r = Registry::default();
        for name in ["gamma", "alpha", "beta"] {
            r.create(name).unwrap();
        }

        let names: Vec<String> = r.list().iter().map(|q| q.name().to_string()).collect();
        assert_eq!(names, ["alpha", "beta", "gamma"]);

        let snapshot = r.list();
        r.create("delta").unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(r.list().len(), 4);
    }

    #[test]
    fn test_reset() {
        let r = Registry::default();
        r.create("a").unwrap();
        r.create("b").unwrap();
        r.reset();

        assert!(r.is_empty());
        assert!(r.lookup("a").is_err());
        assert!(r.list().is_empty());
    }

    #[test]
    fn test_resolve_by_url() {
        let r = Registry::default();
        r.create("jobs").unwrap();

        assert!(r.resolve("http://localhost:9324/123/jobs").is_ok());
        assert!(r.resolve("/123/jobs").is_ok());
        assert!(r.resolve("jobs").is_ok());
        assert!(r.resolve("http://localhost:9324/123/other").is_err());
    }

    #[test]
    fn test_create_rejects_invalid_names() {
        let r = Registry::default();
        let too_long = "q".repeat(MAX_QUEUE_NAME_LEN + 1);

        for name in ["", "a/b", "has space", ".fifo", "caf\u{e9}", too_long.as_str()] {
            assert!(
                matches!(r.create(name), Err(SqsError::InvalidQueueName(ref n)) if n == name),
                "accepted {:?}",
                name
            );
        }
        assert!(r.is_empty());
    }

    #[test]
    fn test_create_accepts_valid_names() {
        let r = Registry::default();
        let longest = "q".repeat(MAX_QUEUE_NAME_LEN);

        for name in ["jobs", "Jobs_2-b", "orders.fifo", longest.as_str()] {
            let q = r.create(name).unwrap();
            assert!(Arc::ptr_eq(&q, &r.resolve(q.url()).unwrap()));
        }
    }

    #[test]
    fn test_queue_name_from_url() {
        assert_eq!(queue_name_from_url("http://localhost:9324/123/q1"), "q1");
        assert_eq!(queue_name_from_url("http://localhost:9324/123/q1/"), "q1");
        assert_eq!(queue_name_from_url("/123/q1"), "q1");
        assert_eq!(queue_name_from_url("q1"), "q1");
        assert_eq!(queue_name_from_url("/"), "");
    }

    #[test]
    fn test_custom_endpoint_and_account() {
        let r = Registry::new("http://sqs.local:4576/", "000000000000");
        let q = r.create("events").unwrap();
        assert_eq!(q.url(), "http://sqs.local:4576/000000000000/events");
        assert_eq!(r.queue_arn("events"), "arn:aws:sqs:us-east-1:000000000000:events");
    }

    #[test]
    fn test_capacity_applies_to_created_queues() {
        let r = Registry::with_capacity(DEFAULT_ENDPOINT, DEFAULT_ACCOUNT_ID, 1);
        let q = r.create("tiny").unwrap();
        q.enqueue("1").unwrap();
        assert!(q.enqueue("2").is_err());
    }

    #[test]
    fn test_independent_registries() {
        let r1 = Registry::default();
        let r2 = Registry::default();
        r1.create("shared-name").unwrap().enqueue("from r1").unwrap();
        r2.create("shared-name").unwrap();

        assert_eq!(r1.lookup("shared-name").unwrap().pending_len(), 1);
        assert_eq!(r2.lookup("shared-name").unwrap().pending_len(), 0);
    }

    #[test]
    fn test_concurrent_create_and_lookup() {
        let r = Arc::new(Registry::default());
        let threads: Vec<_> = (0..8)
            .map(|t| {
                let r = Arc::clone(&r);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        let name = format!("q-{}-{}", t, i);
                        r.create(&name).unwrap();
                        assert_eq!(r.lookup(&name).unwrap().name(), name);
                        let _ = r.list();
                    }
                })
            })
            .collect();
        for t in threads {
            t.join().unwrap();
        }
        assert_eq!(r.len(), 800);
    }
}
