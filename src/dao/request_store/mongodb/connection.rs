use std::time::Duration;

use mongodb::{Client, Database, bson::doc, options::ClientOptions};
use tokio::time::sleep;
use tracing::debug;

use super::error::{MongoDaoError, MongoResult};
use crate::dao::storage::StoreErrorKind;

/// Pings allowed while opening a connection, and the pause between them.
#[derive(Debug, Clone, Copy)]
struct PingSchedule {
    attempts: u32,
    first_delay: Duration,
    max_delay: Duration,
}

impl Default for PingSchedule {
    fn default() -> Self {
        Self {
            attempts: 5,
            first_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl PingSchedule {
    /// Pause after failed attempt `attempt` (1-based).
    fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.first_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Build a client and wait for the server to answer a ping.
///
/// Rejected credentials are reported straight away; only transient failures
/// are retried.
pub async fn establish_connection(
    options: &ClientOptions,
    database_name: &str,
) -> MongoResult<(Client, Database)> {
    let client = Client::with_options(options.clone())
        .map_err(|source| MongoDaoError::ClientConstruction { source })?;
    let database = client.database(database_name);
    let schedule = PingSchedule::default();

    let mut attempt = 1;
    loop {
        let Err(source) = database.run_command(doc! { "ping": 1 }).await else {
            return Ok((client, database));
        };

        let failure = MongoDaoError::InitialPing {
            attempts: attempt,
            source,
        };
        if attempt >= schedule.attempts || failure.kind() == StoreErrorKind::PermissionDenied {
            return Err(failure);
        }

        let delay = schedule.delay_after(attempt);
        debug!(attempt, ?delay, error = %failure, "mongodb ping failed; retrying");
        sleep(delay).await;
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_delays_double_up_to_the_cap() {
        let schedule = PingSchedule::default();
        let delays: Vec<_> = (1..=6).map(|n| schedule.delay_after(n)).collect();
        assert_eq!(
            delays,
            vec![
                Duration::from_millis(250),
                Duration::from_millis(500),
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(4),
                Duration::from_secs(5),
            ]
        );
    }
}
