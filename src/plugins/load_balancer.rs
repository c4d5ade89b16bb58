//! Fans a query out across other steps of the same chain, referenced by tag.
//!
//! Upstream tags are resolved once, when the chain is built (see
//! [`resolve`] and its caller in [`crate::plugin::Registry::build`]) —
//! consistent with the registry being a process-wide, initialized-once
//! table.

use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Deserialize;

use crate::context::Context;
use crate::plugin::{Plugin, Registry, StepConfig};

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum Strategy {
    Random,
    Parallel,
    Fallback,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct Args {
    upstreams: Vec<String>,
    strategy: Strategy,
    #[serde(default = "Args::default_parallel_timeout_ms")]
    parallel_timeout_ms: u64,
    #[serde(default = "Args::default_timeout_ms")]
    timeout_ms: u64,
}

impl Args {
    fn default_parallel_timeout_ms() -> u64 {
        2000
    }

    fn default_timeout_ms() -> u64 {
        5000
    }
}

struct Target {
    handler: Arc<dyn Plugin>,
    args: serde_json::Value,
}

pub struct LoadBalancerPlugin {
    targets: Vec<Target>,
    strategy: Strategy,
    parallel_timeout: Duration,
    timeout: Duration,
}

/// Resolves `config`'s `upstreams` tags against the other steps configured in
/// the same chain. Called once, at chain-build time.
pub(crate) fn resolve(
    registry: &Registry,
    chain_steps: &[(String, StepConfig)],
    config: &StepConfig,
) -> Result<LoadBalancerPlugin, String> {
    let args: Args = super::parse_args(&config.args)?;
    if args.upstreams.is_empty() {
        return Err(String::from("load-balancer requires at least one upstream"));
    }

    let mut targets = Vec::with_capacity(args.upstreams.len());
    for tag in &args.upstreams {
        let Some((_, target_config)) = chain_steps.iter().find(|(step_tag, _)| step_tag == tag) else {
            return Err(format!("load-balancer upstream tag {tag:?} not found in chain"));
        };
        let Some(handler) = registry.get(&target_config.kind) else {
            return Err(format!(
                "load-balancer upstream tag {tag:?} has unknown kind {:?}",
                target_config.kind
            ));
        };
        targets.push(Target {
            handler,
            args: target_config.args.clone(),
        });
    }

    Ok(LoadBalancerPlugin {
        targets,
        strategy: args.strategy,
        parallel_timeout: Duration::from_millis(args.parallel_timeout_ms),
        timeout: Duration::from_millis(args.timeout_ms),
    })
}

/// Registered under the `load-balancer` kind so the kind is recognized by
/// the registry. `Registry::build` special-cases this kind and replaces it
/// with a [`resolve`]d instance before a chain ever runs, so this
/// implementation is only reached if that wiring is bypassed.
pub struct UnresolvedLoadBalancerPlugin;

impl LoadBalancerPlugin {
    async fn run_random(&self, ctx: &mut Context) -> Result<bool, String> {
        let index = rand::thread_rng().gen_range(0..self.targets.len());
        let target = &self.targets[index];
        target.handler.call(ctx, &target.args).await
    }

    async fn run_fallback(&self, ctx: &mut Context) -> Result<bool, String> {
        for target in &self.targets {
            let outcome = tokio::time::timeout(self.timeout, target.handler.call(ctx, &target.args)).await;
            if let Ok(Ok(true)) = outcome {
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn run_parallel(&self, ctx: &mut Context) -> Result<bool, String> {
        let mut pending = Vec::with_capacity(self.targets.len());
        for target in &self.targets {
            let mut sub_ctx = ctx.fork();
            let handler = target.handler.clone();
            let args = target.args.clone();
            let timeout = self.parallel_timeout;
            pending.push(async move {
                let outcome = tokio::time::timeout(timeout, handler.call(&mut sub_ctx, &args)).await;
                (outcome, sub_ctx)
            });
        }

        for (outcome, sub_ctx) in futures::future::join_all(pending).await {
            if matches!(outcome, Ok(Ok(true))) && sub_ctx.resolved {
                if let Some(response) = sub_ctx.response {
                    ctx.set_response(response);
                }
                ctx.metadata.upstream = sub_ctx.metadata.upstream;
                return Ok(true);
            }
        }
        Ok(false)
    }
}

#[async_trait::async_trait]
impl Plugin for LoadBalancerPlugin {
    async fn call(&self, ctx: &mut Context, _args: &serde_json::Value) -> Result<bool, String> {
        match self.strategy {
            Strategy::Random => self.run_random(ctx).await,
            Strategy::Fallback => self.run_fallback(ctx).await,
            Strategy::Parallel => self.run_parallel(ctx).await,
        }
    }
}

#[async_trait::async_trait]
impl Plugin for UnresolvedLoadBalancerPlugin {
    async fn call(&self, _ctx: &mut Context, _args: &serde_json::Value) -> Result<bool, String> {
        Err(String::from("load-balancer step was not resolved at chain build time"))
    }
}
