use std::sync::Arc;
use std::time::Duration;

use textflow_core::{Metadata, TextUnit};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::BoxFuture;
use crate::definition::StageKind;
use crate::error::PipelineError;

/// What a custom stage handler gets to see besides its units.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    pub run_id: Uuid,
    pub stage: String,
    pub config: Metadata,
    /// Fired when the run is cancelled. Long-running handlers should watch it.
    pub cancel: CancellationToken,
}

/// Caller-supplied unit function behind a `custom` stage.
pub trait StageHandler: Send + Sync {
    fn handle<'a>(
        &'a self,
        units: Vec<TextUnit>,
        ctx: &'a HandlerContext,
    ) -> BoxFuture<'a, Result<Vec<TextUnit>, PipelineError>>;
}

struct FnHandler<F>(F);

impl<F> StageHandler for FnHandler<F>
where
    F: Fn(Vec<TextUnit>, &HandlerContext) -> Result<Vec<TextUnit>, PipelineError> + Send + Sync,
{
    fn handle<'a>(
        &'a self,
        units: Vec<TextUnit>,
        ctx: &'a HandlerContext,
    ) -> BoxFuture<'a, Result<Vec<TextUnit>, PipelineError>> {
        let result = (self.0)(units, ctx);
        Box::pin(async move { result })
    }
}

/// Wrap a synchronous closure as a [`StageHandler`].
pub fn handler_fn<F>(f: F) -> Arc<dyn StageHandler>
where
    F: Fn(Vec<TextUnit>, &HandlerContext) -> Result<Vec<TextUnit>, PipelineError>
        + Send
        + Sync
        + 'static,
{
    Arc::new(FnHandler(f))
}

/// Identifies one stage attempt for observers.
#[derive(Debug, Clone, Copy)]
pub struct StageContext<'a> {
    pub run_id: Uuid,
    pub pipeline: &'a str,
    pub stage: &'a str,
    pub kind: StageKind,
    /// One-based.
    pub attempt: u32,
}

/// Instrumentation hook wrapped around every stage attempt.
pub trait StageObserver: Send + Sync {
    fn before_stage(&self, _ctx: &StageContext<'_>) {}

    /// `result` carries the output unit count on success.
    fn after_stage(
        &self,
        _ctx: &StageContext<'_>,
        _result: Result<usize, &PipelineError>,
        _elapsed: Duration,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> HandlerContext {
        let mut config = Metadata::new();
        config.insert("suffix".into(), "!".into());
        HandlerContext {
            run_id: Uuid::new_v4(),
            stage: "shout".into(),
            config,
            cancel: CancellationToken::new(),
        }
    }

    #[tokio::test]
    async fn closure_handler_sees_config() {
        let handler = handler_fn(|units: Vec<TextUnit>, ctx: &HandlerContext| {
            let suffix = ctx.config.get("suffix").and_then(|v| v.as_str()).unwrap_or("");
            Ok(units
                .into_iter()
                .map(|u| {
                    let content = format!("{}{suffix}", u.content.to_uppercase());
                    u.with_content(content)
                })
                .collect())
        });
        let out = handler.handle(vec![TextUnit::new("hey")], &ctx()).await.unwrap();
        assert_eq!(out[0].content, "HEY!");
    }

    #[tokio::test]
    async fn closure_handler_errors_pass_through() {
        let handler = handler_fn(|_: Vec<TextUnit>, _: &HandlerContext| {
            Err(PipelineError::Custom("nope".into()))
        });
        let err = handler.handle(Vec::new(), &ctx()).await.unwrap_err();
        assert_eq!(err.to_string(), "nope");
    }
}
