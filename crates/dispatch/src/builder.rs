//! Assembles a [`Dispatcher`] from a handler and a middleware set.
//!
//! The builder prepends the built-in [`logging`] middleware so it is always
//! the outermost wrapper, unless [`DispatcherBuilder::without_logging`] is
//! called. The chain is composed once, in [`DispatcherBuilder::build`].

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::handler::{BoxHandler, DispatchMode, Dispatcher, Handler};
use crate::middleware::{logging, Middleware};

/// Builder for a [`Dispatcher`].
pub struct DispatcherBuilder<I, O> {
    handler: BoxHandler<I, O>,
    middlewares: Vec<Middleware<I, O>>,
    logging: bool,
}

impl<I, O> DispatcherBuilder<I, O>
where
    I: Serialize + DeserializeOwned + Send + 'static,
    O: Serialize + Send + 'static,
{
    /// Starts a builder around `handler`.
    pub fn new<H>(handler: H) -> Self
    where
        H: Handler<I, O> + 'static,
    {
        Self::from_boxed(Arc::new(handler))
    }

    /// Starts a builder around an already-shared handler.
    pub fn from_boxed(handler: BoxHandler<I, O>) -> Self {
        Self {
            handler,
            middlewares: Vec::new(),
            logging: true,
        }
    }

    /// Appends middlewares. Registration order is preserved: earlier
    /// middlewares wrap later ones.
    pub fn with_middlewares(mut self, middlewares: impl IntoIterator<Item = Middleware<I, O>>) -> Self {
        self.middlewares.extend(middlewares);
        self
    }

    /// Appends a single middleware.
    pub fn with_middleware(mut self, middleware: Middleware<I, O>) -> Self {
        self.middlewares.push(middleware);
        self
    }

    /// Leaves out the built-in logging middleware.
    pub fn without_logging(mut self) -> Self {
        self.logging = false;
        self
    }

    /// Builds a single-mode dispatcher.
    pub fn build(self) -> Dispatcher<I, O> {
        self.build_with_mode(DispatchMode::Single)
    }

    /// Builds a batch-mode dispatcher.
    pub fn build_batch(self) -> Dispatcher<I, O> {
        self.build_with_mode(DispatchMode::Batch)
    }

    /// Builds a dispatcher in the given mode.
    pub fn build_with_mode(self, mode: DispatchMode) -> Dispatcher<I, O> {
        let mut chain = Vec::with_capacity(self.middlewares.len() + 1);
        if self.logging {
            chain.push(logging());
        }
        chain.extend(self.middlewares);
        Dispatcher::new(self.handler, &chain).with_mode(mode)
    }
}
