//! Concurrent fan-out with per-task results.

use std::future::Future;

use futures::future::join_all;

/// Run `task` for every input concurrently and wait for all of them.
///
/// Results come back in input order; one failing task never cancels the
/// others, so callers decide per item how to degrade.
pub async fn fan_out<I, T, F, Fut, R>(inputs: I, task: F) -> Vec<R>
where
    I: IntoIterator<Item = T>,
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    join_all(inputs.into_iter().map(task)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn runs_concurrently_and_keeps_order() {
        let started = Instant::now();
        let results = fan_out([300u64, 100, 200], |delay| async move {
            tokio::time::sleep(Duration::from_millis(delay)).await;
            if delay == 100 {
                Err("boom")
            } else {
                Ok(delay)
            }
        })
        .await;

        assert_eq!(results, vec![Ok(300), Err("boom"), Ok(200)]);
        assert!(started.elapsed() < Duration::from_millis(550));
    }
}
