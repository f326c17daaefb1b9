//! Reference service wired into the `event-dispatch` binary.
//!
//! The service accepts a [`Request`] from any supported source and answers
//! with a [`Response`]. A `user_uuid` of `"x"` is treated as a poisoned
//! record so that failure reporting can be exercised end to end.

use async_trait::async_trait;
use dispatch::{field, Handler, HandlerError, InvocationContext};
use serde::{Deserialize, Serialize};

/// Marker value that makes [`Service`] fail.
pub const POISON_USER: &str = "x";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub user_uuid: String,
    #[serde(default)]
    pub operation_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub status: String,
}

impl Response {
    pub fn ok() -> Self {
        Self {
            status: "ok".to_string(),
        }
    }
}

/// The business handler.
#[derive(Debug, Clone, Default)]
pub struct Service;

#[async_trait]
impl Handler<Request, Response> for Service {
    async fn call(&self, ctx: InvocationContext, input: Request) -> Result<Response, HandlerError> {
        ctx.logger().debug(
            "handling request",
            &field("user_uuid", input.user_uuid.clone().into()),
        );

        if input.user_uuid == POISON_USER {
            return Err("oops".into());
        }

        Ok(Response::ok())
    }
}
