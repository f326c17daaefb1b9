//! Registration of a dispatcher with the Lambda runtime.
//!
//! Each entry point here is a thin binding: it converts the runtime's event
//! into a [`RawPayload`] and [`InvocationContext`], calls
//! [`Dispatcher::event_handler`], and serialises the outcome back.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use dispatch::{
    DispatchMode, Dispatcher, DispatcherBuilder, Handler, InvocationContext, Middleware,
    RawPayload, RequestId,
};
use lambda_runtime::{service_fn, Context, LambdaEvent};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

/// Error type returned to the Lambda runtime.
pub type Error = lambda_runtime::Error;

/// Registers `dispatcher` with the Lambda runtime and serves invocations
/// until the runtime shuts down.
pub async fn run<I, O>(dispatcher: Dispatcher<I, O>) -> Result<(), Error>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    tracing::info!(mode = %dispatcher.mode(), "registering event dispatcher");
    let dispatcher = Arc::new(dispatcher);
    lambda_runtime::run(service_fn(move |event: LambdaEvent<Value>| {
        let dispatcher = Arc::clone(&dispatcher);
        async move { invoke(&dispatcher, event).await }
    }))
    .await
}

/// Handles one runtime event.
pub async fn invoke<I, O>(
    dispatcher: &Dispatcher<I, O>,
    event: LambdaEvent<Value>,
) -> Result<Value, Error>
where
    I: DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    let ctx = invocation_context(&event.context);
    let raw = RawPayload::from_value(&event.payload)?;
    let outcome = dispatcher.event_handler(ctx, &raw).await?;
    Ok(serde_json::to_value(outcome)?)
}

/// Converts the runtime context into an [`InvocationContext`].
///
/// The runtime deadline is milliseconds since the Unix epoch; an empty
/// request id (local emulators) is replaced by a generated one.
pub fn invocation_context(context: &Context) -> InvocationContext {
    let request_id = RequestId::new(context.request_id.clone()).unwrap_or_else(RequestId::generate);
    let ctx = InvocationContext::new(request_id);
    match i64::try_from(context.deadline)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
    {
        Some(deadline) if context.deadline > 0 => ctx.with_deadline(deadline),
        _ => ctx,
    }
}

/// Builds a single-mode dispatcher (logging outermost) and runs it.
pub async fn start<I, O, H>(handler: H, middlewares: Vec<Middleware<I, O>>) -> Result<(), Error>
where
    I: Serialize + DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    H: Handler<I, O> + 'static,
{
    DispatcherBuilder::new(handler)
        .with_middlewares(middlewares)
        .start()
        .await
}

/// Builds a batch-mode dispatcher (logging outermost) and runs it.
pub async fn start_batch<I, O, H>(
    handler: H,
    middlewares: Vec<Middleware<I, O>>,
) -> Result<(), Error>
where
    I: Serialize + DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
    H: Handler<I, O> + 'static,
{
    DispatcherBuilder::new(handler)
        .with_middlewares(middlewares)
        .start_batch()
        .await
}

/// Start-up entry points on [`DispatcherBuilder`].
#[allow(async_fn_in_trait)]
pub trait StartExt {
    /// Builds in single mode and runs.
    async fn start(self) -> Result<(), Error>;

    /// Builds in batch mode and runs.
    async fn start_batch(self) -> Result<(), Error>;

    /// Builds in the given mode and runs.
    async fn start_with_mode(self, mode: DispatchMode) -> Result<(), Error>;
}

impl<I, O> StartExt for DispatcherBuilder<I, O>
where
    I: Serialize + DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    async fn start(self) -> Result<(), Error> {
        run(self.build()).await
    }

    async fn start_batch(self) -> Result<(), Error> {
        run(self.build_batch()).await
    }

    async fn start_with_mode(self, mode: DispatchMode) -> Result<(), Error> {
        run(self.build_with_mode(mode)).await
    }
}
