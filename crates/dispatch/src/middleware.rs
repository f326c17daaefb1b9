//! Handler middleware: composition and the built-in logging wrapper.
//!
//! A [`Middleware`] is a function from handler to handler. A list of them is
//! folded right-to-left by [`compose`], so the first registered middleware is
//! the outermost wrapper: it sees the input first and the result last.
//! Composition happens once, when the dispatcher is built.

use std::marker::PhantomData;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::context::{field, InvocationContext, TracingLogger};
use crate::errors::HandlerError;
use crate::handler::{BoxHandler, Handler};

/// Transforms a handler into a wrapped handler with the same contract.
pub type Middleware<I, O> = Arc<dyn Fn(BoxHandler<I, O>) -> BoxHandler<I, O> + Send + Sync>;

/// Wraps a closure as a [`Middleware`].
pub fn middleware<I, O, F>(f: F) -> Middleware<I, O>
where
    F: Fn(BoxHandler<I, O>) -> BoxHandler<I, O> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Applies `middlewares` around `handler`, first-registered outermost.
pub fn compose<I, O>(handler: BoxHandler<I, O>, middlewares: &[Middleware<I, O>]) -> BoxHandler<I, O> {
    middlewares
        .iter()
        .rev()
        .fold(handler, |next, wrap| wrap(next))
}

// ---------------------------------------------------------------------------
// Logging middleware
// ---------------------------------------------------------------------------

/// Built-in middleware that logs input, output and errors through the
/// context's [`crate::EventLogger`].
///
/// Installs a [`TracingLogger`] into the context when none was injected, so
/// inner middleware and the handler always find one. Never changes the
/// response and never swallows an error.
pub fn logging<I, O>() -> Middleware<I, O>
where
    I: Serialize + Send + 'static,
    O: Serialize + Send + 'static,
{
    Arc::new(|next: BoxHandler<I, O>| -> BoxHandler<I, O> {
        Arc::new(LoggingHandler {
            next,
            _types: PhantomData,
        })
    })
}

struct LoggingHandler<I, O> {
    next: BoxHandler<I, O>,
    _types: PhantomData<fn(I) -> O>,
}

#[async_trait]
impl<I, O> Handler<I, O> for LoggingHandler<I, O>
where
    I: Serialize + Send + 'static,
    O: Serialize + Send + 'static,
{
    async fn call(&self, ctx: InvocationContext, input: I) -> Result<O, HandlerError> {
        let ctx = if ctx.has_logger() {
            ctx
        } else {
            ctx.with_logger(Arc::new(TracingLogger))
        };
        let log = ctx.logger();

        log.info("starting execution", &field("event", log_value(&input)));

        let result = self.next.call(ctx, input).await;
        match &result {
            Ok(out) => log.info("success", &field("response", log_value(out))),
            Err(err) => log.error(
                "execution has an error",
                &field("error", Value::String(err.to_string())),
            ),
        }
        result
    }
}

fn log_value<T: Serialize>(value: &T) -> Value {
    serde_json::to_value(value)
        .unwrap_or_else(|e| Value::String(format!("<not serialisable: {e}>")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{EventLogger, LogFields};
    use crate::handler::handler_fn;
    use std::sync::Mutex;

    type Trace = Arc<Mutex<Vec<String>>>;

    fn tracing_middleware(name: &'static str, trace: Trace) -> Middleware<String, String> {
        middleware(move |next: BoxHandler<String, String>| -> BoxHandler<String, String> {
            let trace = Arc::clone(&trace);
            Arc::new(handler_fn(move |ctx: InvocationContext, input: String| {
                let next = Arc::clone(&next);
                let trace = Arc::clone(&trace);
                async move {
                    trace.lock().unwrap().push(format!("{name}:in"));
                    let out = next.call(ctx, format!("{input}>{name}")).await;
                    trace.lock().unwrap().push(format!("{name}:out"));
                    out
                }
            }))
        })
    }

    fn echo() -> BoxHandler<String, String> {
        Arc::new(handler_fn(|_ctx: InvocationContext, input: String| async move {
            Ok::<_, HandlerError>(input)
        }))
    }

    #[tokio::test]
    async fn test_first_registered_middleware_is_outermost() {
        let trace: Trace = Arc::default();
        let chain = compose(
            echo(),
            &[
                tracing_middleware("a", Arc::clone(&trace)),
                tracing_middleware("b", Arc::clone(&trace)),
            ],
        );

        let out = chain
            .call(InvocationContext::detached(), "x".to_string())
            .await
            .unwrap();

        assert_eq!(out, "x>a>b");
        assert_eq!(*trace.lock().unwrap(), ["a:in", "b:in", "b:out", "a:out"]);
    }

    #[tokio::test]
    async fn test_composition_is_associative() {
        let trace: Trace = Arc::default();
        let a = tracing_middleware("a", Arc::clone(&trace));
        let b = tracing_middleware("b", Arc::clone(&trace));
        let c = tracing_middleware("c", Arc::clone(&trace));

        let flat = compose(echo(), &[a.clone(), b.clone(), c.clone()]);
        let nested = compose(compose(echo(), &[b, c]), &[a]);

        let ctx = InvocationContext::detached();
        assert_eq!(
            flat.call(ctx.clone(), "x".to_string()).await.unwrap(),
            nested.call(ctx, "x".to_string()).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_empty_chain_is_the_handler() {
        let chain = compose(echo(), &[]);
        let out = chain
            .call(InvocationContext::detached(), "plain".to_string())
            .await
            .unwrap();
        assert_eq!(out, "plain");
    }

    #[derive(Default)]
    struct RecordingLogger {
        lines: Mutex<Vec<(String, String, LogFields)>>,
    }

    impl RecordingLogger {
        fn push(&self, level: &str, message: &str, fields: &LogFields) {
            self.lines
                .lock()
                .unwrap()
                .push((level.to_string(), message.to_string(), fields.clone()));
        }
    }

    impl EventLogger for RecordingLogger {
        fn debug(&self, message: &str, fields: &LogFields) {
            self.push("debug", message, fields);
        }
        fn info(&self, message: &str, fields: &LogFields) {
            self.push("info", message, fields);
        }
        fn error(&self, message: &str, fields: &LogFields) {
            self.push("error", message, fields);
        }
    }

    #[tokio::test]
    async fn test_logging_passes_response_through_and_logs_it() {
        let logger = Arc::new(RecordingLogger::default());
        let ctx = InvocationContext::detached().with_logger(logger.clone());
        let chain = compose(echo(), &[logging()]);

        let out = chain.call(ctx, "hi".to_string()).await.unwrap();

        assert_eq!(out, "hi");
        let lines = logger.lines.lock().unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].0, "info");
        assert_eq!(lines[0].2.get("event"), Some(&Value::from("hi")));
        assert_eq!(lines[1].2.get("response"), Some(&Value::from("hi")));
    }

    #[tokio::test]
    async fn test_logging_never_swallows_errors() {
        let logger = Arc::new(RecordingLogger::default());
        let ctx = InvocationContext::detached().with_logger(logger.clone());
        let failing: BoxHandler<String, String> =
            Arc::new(handler_fn(|_ctx: InvocationContext, _input: String| async move {
                Err::<String, HandlerError>("oops".into())
            }));
        let chain = compose(failing, &[logging()]);

        let err = chain.call(ctx, "hi".to_string()).await.unwrap_err();

        assert_eq!(err.to_string(), "oops");
        let lines = logger.lines.lock().unwrap();
        assert_eq!(lines[1].0, "error");
        assert_eq!(lines[1].2.get("error"), Some(&Value::from("oops")));
    }

    #[tokio::test]
    async fn test_logging_installs_a_logger_for_inner_handlers() {
        let saw_logger: BoxHandler<String, bool> =
            Arc::new(handler_fn(|ctx: InvocationContext, _input: String| async move {
                Ok::<_, HandlerError>(ctx.has_logger())
            }));
        let chain = compose(saw_logger, &[logging()]);

        let out = chain
            .call(InvocationContext::detached(), String::new())
            .await
            .unwrap();

        assert!(out);
    }
}
