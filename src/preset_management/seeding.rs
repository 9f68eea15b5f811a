//! Building blocks shared by preset health checks and initialization hooks.

use log::{debug, info, warn};
use std::future::Future;
use std::time::Duration;

use crate::error_handling::types::{InitError, ProbeError};
use crate::preset_management::context::{Context, Interrupted};
use crate::preset_management::types::{render_value, SeedValues};

/// Runs one operation within its own `timeout`, also honouring `ctx`.
///
/// A hung operation is dropped and reported as [`ProbeError::Timeout`];
/// cancellation of `ctx` is reported as [`ProbeError::Cancelled`].
pub async fn bounded_attempt<Fut>(
    ctx: &Context,
    timeout: Duration,
    operation: Fut,
) -> Result<(), ProbeError>
where
    Fut: Future<Output = Result<(), ProbeError>>,
{
    match ctx.with_timeout(timeout).run(operation).await {
        Ok(result) => result,
        Err(Interrupted::DeadlineExceeded) => Err(ProbeError::Timeout(timeout)),
        Err(Interrupted::Cancelled) => Err(ProbeError::Cancelled),
    }
}

/// Writes every seed through `write`, one bounded attempt per key, in key
/// order.
///
/// Stops at the first failing write and reports it. Writes already applied
/// are left in place.
pub async fn seed_values<W, Fut>(
    ctx: &Context,
    values: &SeedValues,
    per_write_timeout: Duration,
    mut write: W,
) -> Result<(), InitError>
where
    W: FnMut(String, String) -> Fut,
    Fut: Future<Output = Result<(), ProbeError>>,
{
    for (key, value) in values {
        let rendered = render_value(value);
        debug!("Seeding key {}", key);
        if let Err(cause) =
            bounded_attempt(ctx, per_write_timeout, write(key.clone(), rendered.clone())).await
        {
            warn!("Seeding stopped at key {}: {}", key, cause);
            return Err(InitError {
                key: key.clone(),
                value: rendered,
                cause,
            });
        }
    }
    info!("Seeded {} values", values.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::future::pending;
    use std::sync::{Arc, Mutex};

    fn seeds(keys: &[&str]) -> SeedValues {
        keys.iter()
            .map(|k| (k.to_string(), json!(format!("v-{}", k))))
            .collect()
    }

    #[tokio::test]
    async fn bounded_attempt_passes_through_results() {
        let ctx = Context::background();
        assert!(bounded_attempt(&ctx, Duration::from_secs(1), async { Ok(()) })
            .await
            .is_ok());

        let err = bounded_attempt(&ctx, Duration::from_secs(1), async {
            Err(ProbeError::Connection("refused".to_string()))
        })
        .await
        .unwrap_err();
        assert!(matches!(err, ProbeError::Connection(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_attempt_becomes_timeout() {
        let ctx = Context::background();
        let err = bounded_attempt(&ctx, Duration::from_secs(2), pending())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Timeout(d) if d == Duration::from_secs(2)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_attempt_is_reported_as_cancelled() {
        let (ctx, handle) = Context::with_cancel();
        handle.cancel();
        let err = bounded_attempt(&ctx, Duration::from_secs(2), pending())
            .await
            .unwrap_err();
        assert!(matches!(err, ProbeError::Cancelled));
    }

    #[tokio::test]
    async fn failing_write_stops_the_remaining_ones() {
        let attempted = Arc::new(Mutex::new(Vec::new()));
        let applied = Arc::new(Mutex::new(Vec::new()));

        let err = seed_values(
            &Context::background(),
            &seeds(&["a", "b", "c", "d"]),
            Duration::from_secs(2),
            |key, _value| {
                let attempted = attempted.clone();
                let applied = applied.clone();
                async move {
                    attempted.lock().unwrap().push(key.clone());
                    if key == "c" {
                        return Err(ProbeError::Operation {
                            op: "put".to_string(),
                            detail: "rejected".to_string(),
                        });
                    }
                    applied.lock().unwrap().push(key);
                    Ok(())
                }
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.key, "c");
        assert_eq!(err.value, "v-c");
        assert_eq!(*attempted.lock().unwrap(), vec!["a", "b", "c"]);
        assert_eq!(*applied.lock().unwrap(), vec!["a", "b"]);
    }

    #[tokio::test(start_paused = true)]
    async fn each_write_gets_its_own_budget() {
        let written = Arc::new(Mutex::new(Vec::new()));

        seed_values(
            &Context::background(),
            &seeds(&["a", "b", "c"]),
            Duration::from_secs(2),
            |key, value| {
                let written = written.clone();
                async move {
                    tokio::time::sleep(Duration::from_millis(1500)).await;
                    written.lock().unwrap().push((key, value));
                    Ok(())
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(written.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_write_fails_with_timeout_and_its_key() {
        let err = seed_values(
            &Context::background(),
            &seeds(&["a", "b"]),
            Duration::from_secs(2),
            |key, _value| async move {
                if key == "b" {
                    pending::<()>().await;
                }
                Ok(())
            },
        )
        .await
        .unwrap_err();

        assert_eq!(err.key, "b");
        assert!(matches!(err.cause, ProbeError::Timeout(_)));
    }
}
