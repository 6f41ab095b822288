use crate::core::Mutex;
use anyhow::Error;
use log::debug;
use std::fmt::Display;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

// KEYS[1]: lock key
// ARGV[1]: owner token
const RELEASE_MUTEX_SCRIPT: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

const RETRY_INTERVAL: Duration = Duration::from_millis(100);

static TOKEN_SEQ: AtomicU64 = AtomicU64::new(0);

#[derive(Clone)]
pub(crate) struct RedisMutex {
    client: redis::Client,
    // seconds a lock stays valid if its owner never releases it
    expire: usize,
    // seconds to wait for a contended lock
    timeout: usize,
}

fn lock_key<K: Display>(key: &K) -> String {
    format!("pickup_point_lock:{}", key)
}

fn new_token() -> String {
    format!(
        "{}-{}-{}",
        std::process::id(),
        TOKEN_SEQ.fetch_add(1, Ordering::Relaxed),
        chrono::Utc::now().timestamp_nanos_opt().unwrap_or_default()
    )
}

impl RedisMutex {
    pub fn new(client: redis::Client, expire: usize, timeout: usize) -> Self {
        Self { client, expire, timeout }
    }

    async fn acquire<K: Display>(&self, conn: &mut redis::aio::Connection, key: &K, token: &str) -> Result<(), Error> {
        let key = lock_key(key);
        let deadline = Instant::now() + Duration::from_secs(self.timeout as u64);
        loop {
            let res: Option<String> = redis::cmd("SET")
                .arg(&key)
                .arg(token)
                .arg("NX")
                .arg("EX")
                .arg(self.expire)
                .query_async(conn)
                .await?;
            if res.is_some() {
                debug!("acquired {}", key);
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(Error::msg(format!("timed out waiting for {}", key)));
            }
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    async fn release<K: Display>(&self, conn: &mut redis::aio::Connection, key: &K, token: &str) -> Result<(), Error> {
        let key = lock_key(key);
        let _: i32 = redis::Script::new(RELEASE_MUTEX_SCRIPT)
            .key(&key)
            .arg(token)
            .invoke_async(conn)
            .await?;
        debug!("released {}", key);
        Ok(())
    }
}

impl<K: Display> Mutex<K> for RedisMutex {
    fn multiple_acquire<'a>(&'a self, keys: &'a [K]) -> Pin<Box<dyn Future<Output = Result<String, Error>> + 'a>>
    where
        K: 'a,
    {
        Box::pin(async move {
            let mut conn = self.client.get_async_connection().await?;
            let token = new_token();
            for (i, key) in keys.iter().enumerate() {
                if let Err(e) = self.acquire(&mut conn, key, &token).await {
                    for held in &keys[..i] {
                        self.release(&mut conn, held, &token).await?;
                    }
                    return Err(e);
                }
            }
            Ok(token)
        })
    }

    fn multiple_release<'a>(&'a self, keys: &'a [K], token: &'a str) -> Pin<Box<dyn Future<Output = Result<(), Error>> + 'a>>
    where
        K: 'a,
    {
        Box::pin(async move {
            let mut conn = self.client.get_async_connection().await?;
            for key in keys {
                self.release(&mut conn, key, token).await?;
            }
            Ok(())
        })
    }
}
