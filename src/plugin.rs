//! Plugin registry and chain executor.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;

use crate::context::{Context, PluginError};

/// A named, stateless handler. Returns `true` iff the step's tag should be
/// added to the context; `Err` is recorded without aborting the chain.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync {
    async fn call(&self, ctx: &mut Context, args: &serde_json::Value) -> Result<bool, String>;
}

/// Adapts a synchronous closure into a [`Plugin`], for handlers with no
/// suspension points of their own (Matcher, Response-Modifier, ...).
pub struct SyncPlugin<F>(pub F);

#[async_trait::async_trait]
impl<F> Plugin for SyncPlugin<F>
where
    F: Fn(&mut Context, &serde_json::Value) -> Result<bool, String> + Send + Sync,
{
    async fn call(&self, ctx: &mut Context, args: &serde_json::Value) -> Result<bool, String> {
        (self.0)(ctx, args)
    }
}

type Handler = Arc<dyn Plugin>;

#[derive(Default)]
pub struct Registry {
    handlers: HashMap<String, Handler>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `kind`. The last registration for a given
    /// kind wins.
    pub fn register(&mut self, kind: impl Into<String>, handler: impl Plugin + 'static) {
        self.handlers.insert(kind.into(), Arc::new(handler));
    }

    /// Convenience for handlers with no suspension points.
    pub fn register_fn<F>(&mut self, kind: impl Into<String>, handler: F)
    where
        F: Fn(&mut Context, &serde_json::Value) -> Result<bool, String> + Send + Sync + 'static,
    {
        self.register(kind, SyncPlugin(handler));
    }

    pub fn get(&self, kind: &str) -> Option<Handler> {
        self.handlers.get(kind).cloned()
    }

    /// Resolves each configured step against the registry. Steps with an
    /// unknown kind, or a load-balancer whose upstream tags don't resolve,
    /// are skipped with a warning, not fatal.
    ///
    /// Tags are assigned to every step first, so a `load-balancer` step can
    /// reference a sibling step appearing later in the same chain.
    pub fn build(&self, configs: Vec<StepConfig>) -> Chain {
        let tagged: Vec<(String, StepConfig)> = configs
            .into_iter()
            .enumerate()
            .map(|(index, config)| {
                let tag = config.tag.clone().unwrap_or_else(|| format!("plugin_{index}"));
                (tag, config)
            })
            .collect();

        let mut steps = Vec::with_capacity(tagged.len());
        for (tag, config) in &tagged {
            let handler: Handler = if config.kind == "load-balancer" {
                match crate::plugins::load_balancer::resolve(self, &tagged, config) {
                    Ok(plugin) => Arc::new(plugin),
                    Err(message) => {
                        tracing::warn!(tag = %tag, %message, "skipping unresolvable load-balancer step");
                        continue;
                    }
                }
            } else {
                match self.get(&config.kind) {
                    Some(handler) => handler,
                    None => {
                        tracing::warn!(kind = %config.kind, "unknown plugin kind, skipping step");
                        continue;
                    }
                }
            };
            steps.push(Step {
                tag: tag.clone(),
                args: config.args.clone(),
                if_matched: config.if_matched.clone(),
                if_not_matched: config.if_not_matched.clone(),
                handler,
            });
        }
        Chain { steps }
    }
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct StepConfig {
    pub kind: String,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub args: serde_json::Value,
    #[serde(default)]
    pub if_matched: Option<String>,
    #[serde(default)]
    pub if_not_matched: Option<String>,
}

struct Step {
    tag: String,
    args: serde_json::Value,
    if_matched: Option<String>,
    if_not_matched: Option<String>,
    handler: Handler,
}

pub struct Chain {
    steps: Vec<Step>,
}

impl Chain {
    pub async fn execute(&self, ctx: &mut Context) {
        for step in &self.steps {
            if let Some(tag) = &step.if_matched {
                if !ctx.has_tag(tag) {
                    continue;
                }
            }
            if let Some(tag) = &step.if_not_matched {
                if ctx.has_tag(tag) {
                    continue;
                }
            }

            let t0 = Instant::now();
            let outcome = AssertUnwindSafe(step.handler.call(ctx, &step.args))
                .catch_unwind()
                .await;
            let elapsed = t0.elapsed().as_millis();
            ctx.metadata.timings.insert(step.tag.clone(), elapsed);

            match outcome {
                Ok(Ok(true)) => ctx.add_tag(step.tag.clone()),
                Ok(Ok(false)) => {}
                Ok(Err(message)) => {
                    tracing::warn!(tag = %step.tag, %message, "plugin returned an error");
                    ctx.metadata.errors.push(PluginError {
                        plugin_tag: step.tag.clone(),
                        message,
                    });
                }
                Err(_) => {
                    tracing::error!(tag = %step.tag, "plugin panicked");
                    ctx.metadata.errors.push(PluginError {
                        plugin_tag: step.tag.clone(),
                        message: String::from("plugin panicked"),
                    });
                }
            }

            if ctx.resolved {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn step(kind: &str, tag: &str) -> StepConfig {
        StepConfig {
            kind: kind.to_string(),
            tag: Some(tag.to_string()),
            args: serde_json::Value::Null,
            if_matched: None,
            if_not_matched: None,
        }
    }

    #[tokio::test]
    async fn should_execute_steps_in_order() {
        let mut registry = Registry::new();
        let order = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));

        for name in ["s1", "s2", "s3"] {
            let order = order.clone();
            let name = name.to_string();
            registry.register_fn(name.clone(), move |_ctx, _args| {
                order.lock().unwrap().push(name.clone());
                Ok(true)
            });
        }

        let chain = registry.build(vec![step("s1", "s1"), step("s2", "s2"), step("s3", "s3")]);
        let mut ctx = Context::new(None, None);
        chain.execute(&mut ctx).await;

        assert_eq!(*order.lock().unwrap(), vec!["s1", "s2", "s3"]);
        assert_eq!(ctx.metadata.timings.len(), 3);
    }

    #[tokio::test]
    async fn should_skip_step_when_if_matched_tag_absent() {
        let mut registry = Registry::new();
        registry.register_fn("noop", |_ctx, _args| Ok(false));

        let mut configured = step("noop", "gated");
        configured.if_matched = Some(String::from("never-set"));
        let chain = registry.build(vec![configured]);

        let mut ctx = Context::new(None, None);
        chain.execute(&mut ctx).await;
        assert!(!ctx.metadata.timings.contains_key("gated"));
    }

    #[tokio::test]
    async fn should_short_circuit_once_resolved() {
        let mut registry = Registry::new();
        registry.register_fn("resolve", |ctx, _args| {
            ctx.set_response(vec![1]);
            Ok(true)
        });
        registry.register_fn("never", |_ctx, _args| {
            panic!("must not run after resolution");
        });

        let chain = registry.build(vec![step("resolve", "resolve"), step("never", "never")]);
        let mut ctx = Context::new(None, None);
        chain.execute(&mut ctx).await;

        assert!(ctx.resolved);
        assert!(!ctx.metadata.timings.contains_key("never"));
    }

    #[tokio::test]
    async fn should_isolate_plugin_errors() {
        let mut registry = Registry::new();
        registry.register_fn("ok", |_ctx, _args| Ok(true));
        registry.register_fn("throw", |_ctx, _args| Err(String::from("boom")));
        registry.register_fn("record", |_ctx, _args| Ok(true));

        let chain = registry.build(vec![
            step("ok", "plugin_ok"),
            step("throw", "plugin_throw"),
            step("record", "plugin_record"),
        ]);
        let mut ctx = Context::new(None, None);
        chain.execute(&mut ctx).await;

        assert!(ctx.metadata.timings.contains_key("plugin_ok"));
        assert!(ctx.metadata.timings.contains_key("plugin_record"));
        assert_eq!(ctx.metadata.errors.len(), 1);
        assert_eq!(ctx.metadata.errors[0].plugin_tag, "plugin_throw");
    }

    #[tokio::test]
    async fn should_skip_unknown_kind_with_warning_not_panic() {
        let registry = Registry::new();
        let chain = registry.build(vec![step("missing", "gone")]);
        let mut ctx = Context::new(None, None);
        chain.execute(&mut ctx).await;
        assert!(ctx.metadata.timings.is_empty());
    }

    #[tokio::test]
    async fn should_default_tag_to_plugin_index_when_unset() {
        let mut registry = Registry::new();
        registry.register_fn("noop", |_ctx, _args| Ok(true));
        let mut configured = step("noop", "irrelevant");
        configured.tag = None;
        let chain = registry.build(vec![configured]);
        let mut ctx = Context::new(None, None);
        chain.execute(&mut ctx).await;
        assert!(ctx.has_tag("plugin_0"));
    }

    #[tokio::test]
    async fn should_resolve_load_balancer_upstreams_by_sibling_tag() {
        let mut registry = Registry::new();
        registry.register_fn("ok", |ctx, _args| {
            ctx.set_response(vec![7]);
            Ok(true)
        });

        let mut upstream = step("ok", "primary");
        let mut balancer = StepConfig {
            kind: String::from("load-balancer"),
            tag: Some(String::from("lb")),
            args: serde_json::json!({ "upstreams": ["primary"], "strategy": "fallback" }),
            if_matched: None,
            if_not_matched: None,
        };
        upstream.tag = Some(String::from("primary"));
        balancer.tag = Some(String::from("lb"));

        let chain = registry.build(vec![upstream, balancer]);
        let mut ctx = Context::new(None, None);
        chain.execute(&mut ctx).await;

        assert_eq!(ctx.response, Some(vec![7]));
        assert!(ctx.has_tag("lb"));
    }

    #[tokio::test]
    async fn should_skip_load_balancer_with_unresolvable_upstream_tag() {
        let registry = Registry::new();
        let balancer = StepConfig {
            kind: String::from("load-balancer"),
            tag: Some(String::from("lb")),
            args: serde_json::json!({ "upstreams": ["missing"], "strategy": "fallback" }),
            if_matched: None,
            if_not_matched: None,
        };
        let chain = registry.build(vec![balancer]);
        let mut ctx = Context::new(None, None);
        chain.execute(&mut ctx).await;
        assert!(ctx.metadata.timings.is_empty());
    }
}
