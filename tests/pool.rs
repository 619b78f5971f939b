//! Behavioral tests against a live MySQL server, following spec.md's
//! acquire/release/close scenarios. Skipped entirely when `DATABASE_URL`
//! isn't set, matching this crate's other connection-level tests.

use std::time::Duration;

use mysql_proto::{Pool, PoolOptions};

fn database_url() -> Option<String> {
    dotenvy::var("DATABASE_URL").ok()
}

#[async_std::test]
async fn acquire_reuses_released_connections() -> mysql_proto::Result<()> {
    let Some(url) = database_url() else { return Ok(()) };

    let pool = PoolOptions::new().max_connections(1).connect(&url).await?;

    let conn = pool.acquire().await?;
    drop(conn);

    // the released connection must come back through the idle queue rather
    // than a fresh connect, since max_connections is 1.
    let conn = pool.acquire().await?;
    assert_eq!(pool.size(), 1);
    drop(conn);

    Ok(())
}

#[async_std::test]
async fn acquire_blocks_when_the_pool_is_full_then_unblocks_on_release() -> mysql_proto::Result<()> {
    let Some(url) = database_url() else { return Ok(()) };

    let pool = PoolOptions::new()
        .max_connections(1)
        .connection_timeout(Duration::from_secs(5))
        .connect(&url)
        .await?;

    let first = pool.acquire().await?;

    let pool_clone = pool.clone();
    let waiter = async_std::task::spawn(async move { pool_clone.acquire().await });

    async_std::task::sleep(Duration::from_millis(100)).await;
    assert_eq!(pool.status().waiting, 1);

    drop(first);

    let second = waiter.await?;
    assert_eq!(pool.size(), 1);
    drop(second);

    Ok(())
}

#[async_std::test]
async fn acquire_times_out_when_no_connection_becomes_available() -> mysql_proto::Result<()> {
    let Some(url) = database_url() else { return Ok(()) };

    let pool = PoolOptions::new()
        .max_connections(1)
        .connection_timeout(Duration::from_millis(200))
        .connect(&url)
        .await?;

    let _held = pool.acquire().await?;

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, mysql_proto::Error::AcquireTimeout));

    Ok(())
}

#[async_std::test]
async fn close_fails_waiters_and_drains_idle_connections() -> mysql_proto::Result<()> {
    let Some(url) = database_url() else { return Ok(()) };

    let pool = PoolOptions::new().max_connections(2).connect(&url).await?;

    let a = pool.acquire().await?;
    let b = pool.acquire().await?;
    drop(b);

    pool.close().await;
    assert!(pool.is_closed());
    assert_eq!(pool.idle(), 0);

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, mysql_proto::Error::PoolClosed));

    drop(a);
    Ok(())
}

#[async_std::test]
async fn min_connections_are_established_in_the_background() -> mysql_proto::Result<()> {
    let Some(url) = database_url() else { return Ok(()) };

    let pool = PoolOptions::new()
        .min_connections(2)
        .max_connections(5)
        .connect(&url)
        .await?;

    // `connect()` eagerly opens one connection to validate the options; the
    // housekeeper tops up the rest in the background.
    async_std::task::sleep(Duration::from_secs(2)).await;
    assert!(pool.size() >= 2);

    Ok(())
}
