//! Suspension bridge between asynchronous platform calls and the
//! cooperative interpreter.
//!
//! A handler describes the call with an [`AsyncCall`] and hands it to
//! [`CommandContext::bind`](super::command::CommandContext::bind). The
//! operation runs as a tokio task; when it settles the task stores a
//! resolver in the call's settlement slot and nothing else. The interpreter
//! keeps re-visiting the binding instruction and only runs the resolver on
//! the first step after settlement, so the continuation's writes land
//! immediately before the next instruction of the same interpreter and any
//! fatal error surfaces inside a normal step.
//!
//! ```text
//! NONE ──bind──▶ WAITING ──settle──▶ READY_SUCCESS | READY_FAILURE ──step──▶ NONE
//! ```

use futures::FutureExt;
use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;

use super::error::{
    ApiResult, CallFailure, CommandError, CommandResult, ScriptError, ScriptResult,
};
use super::script::ScriptLocation;
use super::session::SessionState;

/// Work done on the interpreter's step once a call has settled.
pub(crate) type Resolver =
    Box<dyn FnOnce(&mut SessionState, &ScriptLocation) -> ScriptResult<()> + Send>;

type SuccessFn<T> = Box<dyn FnOnce(&mut SessionState, T) + Send>;
type FailureFn = Box<dyn FnOnce(&mut SessionState, &CallFailure) + Send>;

/// An asynchronous operation plus its optional continuations.
pub struct AsyncCall<T> {
    operation: BoxFuture<'static, ApiResult<T>>,
    on_success: Option<SuccessFn<T>>,
    on_failure: Option<FailureFn>,
}

impl<T: Send + 'static> AsyncCall<T> {
    /// Wrap an operation with no continuations.
    pub fn new<F>(operation: F) -> Self
    where
        F: Future<Output = ApiResult<T>> + Send + 'static,
    {
        Self {
            operation: operation.boxed(),
            on_success: None,
            on_failure: None,
        }
    }

    /// Run `f` with the value when the operation succeeds.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut SessionState, T) + Send + 'static,
    {
        self.on_success = Some(Box::new(f));
        self
    }

    /// Run `f` with the located error when the operation fails recoverably.
    ///
    /// Client-fault failures never reach this continuation; they halt the
    /// interpreter instead.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(&mut SessionState, &CallFailure) + Send + 'static,
    {
        self.on_failure = Some(Box::new(f));
        self
    }
}

/// One in-flight call bound to an interpreter.
pub struct PendingCall {
    cursor: usize,
    settlement: Arc<Mutex<Option<Resolver>>>,
}

impl PendingCall {
    /// Start `call` on the ambient tokio runtime, bound to the instruction
    /// at `cursor`.
    pub(crate) fn spawn<T: Send + 'static>(call: AsyncCall<T>, cursor: usize) -> CommandResult<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|err| CommandError::NoAsyncRuntime(err.to_string()))?;

        let settlement: Arc<Mutex<Option<Resolver>>> = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&settlement);
        let AsyncCall {
            operation,
            on_success,
            on_failure,
        } = call;

        runtime.spawn(async move {
            let resolver = settle(operation.await, on_success, on_failure);
            *slot.lock() = Some(resolver);
        });

        Ok(Self { cursor, settlement })
    }

    /// Index of the instruction that issued the call.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether the operation has settled and awaits its step.
    pub fn is_settled(&self) -> bool {
        self.settlement.lock().is_some()
    }

    pub(crate) fn take_resolver(&self) -> Option<Resolver> {
        self.settlement.lock().take()
    }
}

impl std::fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCall")
            .field("cursor", &self.cursor)
            .field("settled", &self.is_settled())
            .finish()
    }
}

fn settle<T: Send + 'static>(
    outcome: ApiResult<T>,
    on_success: Option<SuccessFn<T>>,
    on_failure: Option<FailureFn>,
) -> Resolver {
    match outcome {
        Ok(value) => Box::new(move |state, _location| {
            if let Some(on_success) = on_success {
                on_success(state, value);
            }
            Ok(())
        }),
        Err(error) => Box::new(move |state, location| {
            if error.code.is_client_fault() {
                return Err(ScriptError::Fatal {
                    location: location.clone(),
                    source: error,
                });
            }
            let failure = CallFailure {
                location: location.clone(),
                error,
            };
            tracing::error!(
                target: "shimkit::diagnostic",
                line = failure.location.line,
                command = %failure.location.command,
                content = %failure.location.content,
                code = %failure.error.code,
                error = ?failure.error,
                "platform call failed: {}",
                failure.error.message
            );
            if let Some(on_failure) = on_failure {
                on_failure(state, &failure);
            }
            Ok(())
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::error::{ApiError, ApiErrorCode};
    use crate::runtime::script::ScriptCommand;
    use crate::runtime::session::tests::test_state;
    use tokio::sync::oneshot;

    fn location() -> ScriptLocation {
        ScriptCommand::new(3, "Probe", &["1"]).location()
    }

    async fn settled(call: &PendingCall) {
        while !call.is_settled() {
            tokio::task::yield_now().await;
        }
    }

    #[test]
    fn test_spawn_outside_runtime_is_rejected() {
        let call = AsyncCall::new(async { Ok(1) });
        let err = PendingCall::spawn(call, 0).unwrap_err();
        assert!(matches!(err, CommandError::NoAsyncRuntime(_)));
    }

    #[tokio::test]
    async fn test_resolver_only_installed_after_settlement() {
        let (tx, rx) = oneshot::channel::<i64>();
        let call = AsyncCall::new(async move { Ok(rx.await.unwrap_or_default()) });
        let pending = PendingCall::spawn(call, 4).unwrap();

        tokio::task::yield_now().await;
        assert!(!pending.is_settled());
        assert!(pending.take_resolver().is_none());

        tx.send(9).unwrap();
        settled(&pending).await;
        assert_eq!(pending.cursor(), 4);
        assert!(pending.take_resolver().is_some());
        assert!(pending.take_resolver().is_none());
    }

    #[tokio::test]
    async fn test_success_resolver_runs_continuation() {
        let mut state = test_state();
        let target = state.variables.id(1).unwrap();
        let call = AsyncCall::new(async { Ok(41_i64) })
            .on_success(move |state, value| state.variables.set(target, value + 1));
        let pending = PendingCall::spawn(call, 0).unwrap();
        settled(&pending).await;

        let resolver = pending.take_resolver().unwrap();
        resolver(&mut state, &location()).unwrap();
        assert_eq!(state.variables.get(target).as_number(), Some(42));
    }

    #[tokio::test]
    async fn test_recoverable_failure_reaches_failure_continuation() {
        let mut state = test_state();
        let target = state.variables.id(2).unwrap();
        let call = AsyncCall::<()>::new(async {
            Err(ApiError::new(ApiErrorCode::ApiCallLimitExceeded, "busy"))
        })
        .on_failure(move |state, failure| state.variables.set(target, failure.to_string()));
        let pending = PendingCall::spawn(call, 0).unwrap();
        settled(&pending).await;

        pending.take_resolver().unwrap()(&mut state, &location()).unwrap();
        assert_eq!(
            state.variables.get(target).to_string(),
            "line 3 (Probe: Probe 1): API_CALL_LIMIT_EXCEEDED: busy"
        );
    }

    #[tokio::test]
    async fn test_client_fault_becomes_fatal_with_location() {
        let mut state = test_state();
        let call = AsyncCall::<()>::new(async {
            Err(ApiError::new(ApiErrorCode::BadRequest, "bad board"))
        })
        .on_failure(|_, _| panic!("client faults must not reach on_failure"));
        let pending = PendingCall::spawn(call, 0).unwrap();
        settled(&pending).await;

        let err = pending.take_resolver().unwrap()(&mut state, &location()).unwrap_err();
        match err {
            ScriptError::Fatal { location, source } => {
                assert_eq!(location.line, 3);
                assert_eq!(location.command, "Probe");
                assert_eq!(source.code, ApiErrorCode::BadRequest);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
