use std::collections::HashMap;

use redis::aio::MultiplexedConnection;
use tracing::debug;

use super::{KvStore, StoreCommand, StoreResult};

/// Keys requested per SCAN round trip
const SCAN_COUNT: usize = 500;

pub(crate) struct RedisStore {
    conn: MultiplexedConnection,
}

impl RedisStore {
    pub(crate) async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        debug!("connected to redis");
        Ok(Self { conn })
    }
}

impl KvStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        let fields = redis::cmd("HGETALL").arg(key).query_async(&mut conn).await?;
        Ok(fields)
    }

    async fn hash_get_field(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        let value = redis::cmd("HGET")
            .arg(key)
            .arg(field)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_members(&self, key: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut members: Vec<String> = redis::cmd("SMEMBERS").arg(key).query_async(&mut conn).await?;
        members.sort();
        Ok(members)
    }

    async fn scan_keys(&self, pattern: &str) -> StoreResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut keys = Vec::new();
        let mut cursor: u64 = 0;
        loop {
            let (next, batch): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_COUNT)
                .query_async(&mut conn)
                .await?;
            keys.extend(batch);
            if next == 0 {
                break;
            }
            cursor = next;
        }
        // SCAN may return a key more than once
        keys.sort();
        keys.dedup();
        debug!(pattern, count = keys.len(), "scanned keys");
        Ok(keys)
    }

    async fn pipeline(&self, commands: &[StoreCommand]) -> StoreResult<Vec<Option<String>>> {
        if commands.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        for command in commands {
            pipe.cmd(&command.name).arg(&command.args);
        }
        let replies = pipe.query_async(&mut conn).await?;
        Ok(replies)
    }
}
