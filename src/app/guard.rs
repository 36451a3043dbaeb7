//! Panic guards around user entry points.
//!
//! Every user call site (Setup, Run, Introspect, Close) executes inside a
//! spawned task; a panicked task surfaces as an error naming the phase and
//! the panic payload instead of crossing a task boundary.

use std::any::Any;

pub(crate) enum Phase {
    Initialize,
    Run,
    Introspect,
    Close,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Initialize => "Initialize",
            Phase::Run => "Run",
            Phase::Introspect => "Introspect",
            Phase::Close => "Close",
        };
        f.write_str(name)
    }
}

pub(crate) async fn guarded<T, F>(phase: Phase, fut: F) -> anyhow::Result<T>
where
    T: Send + 'static,
    F: std::future::Future<Output = anyhow::Result<T>> + Send + 'static,
{
    match tokio::spawn(fut).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => Err(anyhow::anyhow!(
            "panic in {} func: {}",
            phase,
            panic_message(err.into_panic())
        )),
        Err(err) => Err(anyhow::anyhow!("{} task aborted: {}", phase, err)),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn panics_become_phase_errors() {
        let err = guarded::<(), _>(Phase::Initialize, async { panic!("boom") })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "panic in Initialize func: boom");
    }

    #[tokio::test]
    async fn string_payloads_are_preserved() {
        let err = guarded::<(), _>(Phase::Run, async { panic!("{}", 42) })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "panic in Run func: 42");
    }

    #[tokio::test]
    async fn ok_results_pass_through() {
        let value = guarded(Phase::Introspect, async { Ok(7u8) }).await.unwrap();
        assert_eq!(value, 7);
    }
}
