//! The three entry points: `await_result`, `await_completion`, and `sleep`.

use std::convert::Infallible;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, trace};

use crate::{Completion, InterruptError, InterruptToken, Interruption};

/// Largest sub-millisecond component accepted by [`sleep_nanos`].
pub const MAX_EXTRA_NANOS: i32 = 999_999;

/// Runs `op` to completion unless `token` is interrupted first.
///
/// - `op` resolves to `Ok(value)` → `Ok(Completion::done(value))`; a `None`
///   value is a normal, empty completion.
/// - `op` resolves to `Err(Interruption::Interrupted)`, or `token` is
///   raised while `op` is pending → `op` is dropped, the token's flag is
///   left raised, and `Ok(Completion::interrupted())` is returned.
/// - `op` resolves to `Err(Interruption::Failed(e))` → `Err(e)`, unchanged.
///
/// If `op` is ready on the same poll the token is raised, `op`'s own result
/// wins: an operation that never observes interruption completes normally.
pub async fn await_result<T, E, F>(
    token: &InterruptToken,
    op: F,
) -> Result<Completion<T>, E>
where
    F: Future<Output = Result<Option<T>, Interruption<E>>>,
{
    let outcome = tokio::select! {
        biased;
        outcome = op => outcome,
        () = token.interrupted() => Err(Interruption::Interrupted),
    };

    match outcome {
        Ok(value) => Ok(Completion::done(value)),
        Err(Interruption::Interrupted) => {
            // The operation may have consumed the flag on its way out.
            // Put it back so the caller and any enclosing wait see it.
            token.interrupt();
            debug!("wait interrupted");
            Ok(Completion::interrupted())
        }
        Err(Interruption::Failed(err)) => Err(err),
    }
}

/// Like [`await_result`] for operations that produce nothing.
///
/// Returns `Ok(true)` if `op` completed, `Ok(false)` if it was interrupted.
pub async fn await_completion<E, F>(
    token: &InterruptToken,
    op: F,
) -> Result<bool, E>
where
    F: Future<Output = Result<(), Interruption<E>>>,
{
    let completion =
        await_result(token, async move { op.await.map(|()| None::<()>) })
            .await?;
    Ok(completion.is_completed())
}

/// Suspends the calling task for `millis` milliseconds.
///
/// Returns `Ok(true)` if the whole duration elapsed, `Ok(false)` if the
/// task was interrupted first (flag left raised).
///
/// # Errors
/// [`InterruptError::InvalidArgument`] if `millis` is negative.
pub async fn sleep(
    token: &InterruptToken,
    millis: i64,
) -> Result<bool, InterruptError> {
    sleep_nanos(token, millis, 0).await
}

/// Suspends the calling task for `millis` milliseconds plus `nanos`
/// nanoseconds.
///
/// # Errors
/// [`InterruptError::InvalidArgument`] if `millis` is negative or `nanos`
/// is outside `0..=999_999`.
pub async fn sleep_nanos(
    token: &InterruptToken,
    millis: i64,
    nanos: i32,
) -> Result<bool, InterruptError> {
    let duration = sleep_duration(millis, nanos)?;
    Ok(sleep_for(token, duration).await)
}

/// Suspends the calling task for an already-validated `duration`.
///
/// A token that is raised before the call returns `false` without
/// sleeping.
pub async fn sleep_for(token: &InterruptToken, duration: Duration) -> bool {
    trace!(?duration, "interruptible sleep");

    let slept = await_completion(token, async {
        if token.is_interrupted() {
            return Err(Interruption::<Infallible>::Interrupted);
        }
        tokio::time::sleep(duration).await;
        Ok(())
    })
    .await;

    slept.unwrap_or_else(|never| match never {})
}

fn sleep_duration(millis: i64, nanos: i32) -> Result<Duration, InterruptError> {
    if millis < 0 {
        return Err(InterruptError::InvalidArgument(format!(
            "millis must not be negative, got {millis}"
        )));
    }
    if !(0..=MAX_EXTRA_NANOS).contains(&nanos) {
        return Err(InterruptError::InvalidArgument(format!(
            "nanos must be in [0, {MAX_EXTRA_NANOS}], got {nanos}"
        )));
    }

    Ok(Duration::from_millis(millis as u64)
        + Duration::from_nanos(nanos as u64))
}
