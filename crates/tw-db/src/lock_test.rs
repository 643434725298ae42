use super::*;

#[tokio::test]
async fn test_acquire_and_release() {
    let registry = LockRegistry::new();
    let lock = registry
        .acquire("tidewater:db", Duration::from_millis(50))
        .await
        .unwrap();
    assert_eq!(lock.name(), "tidewater:db");
    assert!(registry.is_held("tidewater:db"));

    assert!(lock.release());
    assert!(lock.is_released());
    assert!(!registry.is_held("tidewater:db"));
}

#[tokio::test]
async fn test_release_is_idempotent() {
    let registry = LockRegistry::new();
    let lock = registry
        .acquire("l", Duration::from_millis(50))
        .await
        .unwrap();
    assert!(lock.release());
    assert!(!lock.release());
    drop(lock);
    assert!(!registry.is_held("l"));
}

#[tokio::test]
async fn test_second_acquire_times_out() {
    let registry = LockRegistry::new();
    let _held = registry
        .acquire("l", Duration::from_millis(50))
        .await
        .unwrap();

    let err = registry
        .acquire("l", Duration::from_millis(60))
        .await
        .unwrap_err();
    match err {
        DbError::LockTimeout { name, waited } => {
            assert_eq!(name, "l");
            assert!(waited >= Duration::from_millis(60));
        }
        other => panic!("expected LockTimeout, got {other:?}"),
    }
}

#[tokio::test]
async fn test_distinct_names_do_not_conflict() {
    let registry = LockRegistry::new();
    let _a = registry.acquire("a", Duration::from_millis(10)).await.unwrap();
    let _b = registry.acquire("b", Duration::from_millis(10)).await.unwrap();
    assert!(registry.is_held("a"));
    assert!(registry.is_held("b"));
}

#[tokio::test]
async fn test_waiter_gets_lock_after_release() {
    let registry = LockRegistry::new();
    let held = registry
        .acquire("l", Duration::from_millis(10))
        .await
        .unwrap();

    let waiter = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move { registry.acquire("l", Duration::from_secs(5)).await })
    };

    tokio::time::sleep(Duration::from_millis(30)).await;
    held.release();

    let lock = waiter.await.unwrap().unwrap();
    assert_eq!(lock.name(), "l");
}

#[tokio::test]
async fn test_drop_releases_lock() {
    let registry = LockRegistry::new();
    {
        let _lock = registry
            .acquire("l", Duration::from_millis(10))
            .await
            .unwrap();
        assert!(registry.is_held("l"));
    }
    assert!(!registry.is_held("l"));
}

#[tokio::test]
async fn test_stale_handle_does_not_release_new_owner() {
    let registry = LockRegistry::new();
    let first = registry
        .acquire("l", Duration::from_millis(10))
        .await
        .unwrap();
    first.release();

    let second = registry
        .acquire("l", Duration::from_millis(10))
        .await
        .unwrap();
    // The first handle is spent; releasing it again must not free the second owner's lock.
    assert!(!first.release());
    assert!(registry.is_held("l"));
    drop(second);
    assert!(!registry.is_held("l"));
}

#[tokio::test]
async fn test_panicking_task_releases_lock() {
    let registry = LockRegistry::new();
    let task = {
        let registry = Arc::clone(&registry);
        tokio::spawn(async move {
            let _lock = registry
                .acquire("l", Duration::from_millis(10))
                .await
                .unwrap();
            panic!("boom");
        })
    };
    assert!(task.await.is_err());
    assert!(!registry.is_held("l"));
}

#[tokio::test]
async fn test_shared_registry_is_per_key() {
    let first = LockRegistry::shared("lock_test:shared");
    let second = LockRegistry::shared("lock_test:shared");
    let other = LockRegistry::shared("lock_test:other");
    assert!(Arc::ptr_eq(&first, &second));
    assert!(!Arc::ptr_eq(&first, &other));

    let _held = first.acquire("l", Duration::from_millis(10)).await.unwrap();
    assert!(second.is_held("l"));
    assert!(!other.is_held("l"));
}
