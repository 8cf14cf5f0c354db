// ============================
// authgate-backend/src/pipeline.rs
// ============================
//! Ordered request stages with an explicit continue / halt signal.
//!
//! A route runs its pipeline before doing any work; the first stage that
//! halts decides the response.
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;

use crate::auth::{require_authenticated, AuthRateLimiter};
use crate::error::AppError;
use crate::metrics;
use crate::session::Session;

/// Per-request state the stages look at.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub session: Session,
    pub client_ip: Option<IpAddr>,
}

impl RequestContext {
    pub fn new(session: Session, client_ip: Option<IpAddr>) -> Self {
        Self { session, client_ip }
    }
}

/// What a stage tells the pipeline.
#[derive(Debug)]
pub enum Flow {
    Continue,
    Halt(AppError),
}

/// One step of a pipeline.
#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, ctx: &RequestContext) -> Flow;
}

/// Stages run in insertion order.
#[derive(Clone, Default)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stage<S: Stage + 'static>(mut self, stage: S) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// `Ok` if every stage continued, otherwise the first halt's error.
    pub async fn run(&self, ctx: &RequestContext) -> Result<(), AppError> {
        for stage in &self.stages {
            match stage.run(ctx).await {
                Flow::Continue => {},
                Flow::Halt(err) => {
                    tracing::debug!(stage = stage.name(), error = %err, "pipeline halted");
                    return Err(err);
                },
            }
        }
        Ok(())
    }
}

/// Halts unless the session carries a user.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireAuthenticated;

#[async_trait]
impl Stage for RequireAuthenticated {
    fn name(&self) -> &'static str {
        "require_authenticated"
    }

    async fn run(&self, ctx: &RequestContext) -> Flow {
        match require_authenticated(&ctx.session) {
            Ok(_) => Flow::Continue,
            Err(err) => Flow::Halt(err.into()),
        }
    }
}

/// Halts while the client IP is locked out of login.
#[derive(Debug, Clone)]
pub struct LoginThrottle {
    limiter: Arc<AuthRateLimiter>,
}

impl LoginThrottle {
    pub fn new(limiter: Arc<AuthRateLimiter>) -> Self {
        Self { limiter }
    }
}

#[async_trait]
impl Stage for LoginThrottle {
    fn name(&self) -> &'static str {
        "login_throttle"
    }

    async fn run(&self, ctx: &RequestContext) -> Flow {
        // without an address there is nothing to key on
        let Some(ip) = ctx.client_ip else {
            return Flow::Continue;
        };

        if self.limiter.check_rate_limit(ip) {
            Flow::Continue
        } else {
            ::metrics::counter!(metrics::LOGIN_THROTTLED).increment(1);
            Flow::Halt(AppError::AuthRateLimited)
        }
    }
}
