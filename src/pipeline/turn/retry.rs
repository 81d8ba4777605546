use std::future::Future;

/// Outcome of a bounded retry run.
#[derive(Debug)]
pub struct RetryOutcome<T, E> {
    /// First accepted value, if any attempt succeeded.
    pub value: Option<T>,
    /// Attempts consumed, including the successful one.
    pub attempts: usize,
    /// Failure of every rejected attempt, in order.
    pub failures: Vec<E>,
}

/// Run `attempt` up to `max_attempts` times, stopping at the first `Ok`.
///
/// Each call receives its 1-based attempt number and must perform a fresh
/// operation; nothing is cached between attempts. Zero attempts yields an
/// empty outcome without calling `attempt`.
pub async fn retry_bounded<T, E, F, Fut>(max_attempts: usize, mut attempt: F) -> RetryOutcome<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut failures = Vec::new();

    for n in 1..=max_attempts {
        match attempt(n).await {
            Ok(value) => {
                return RetryOutcome {
                    value: Some(value),
                    attempts: n,
                    failures,
                }
            }
            Err(e) => failures.push(e),
        }
    }

    RetryOutcome {
        value: None,
        attempts: max_attempts,
        failures,
    }
}
