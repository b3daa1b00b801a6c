//! Daemon composition root

use ferry_config::Config;
use ferry_plugins::{PluginManager, PluginRegistry, SetupContext, SetupSummary};
use ferry_protocols::{BindContext, BindFailure};
use ferry_runtime::{Lifecycle, RetryPolicy, SignalHandler};

/// Source recorded for plugins compiled into the binary
pub const BUILTIN_SOURCE: &str = "builtin";

/// Registry holding every builtin plugin, already activated
pub fn builtin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    ferry_plugin_collectd::register(&mut registry);

    let loaded = registry.activate(BUILTIN_SOURCE);
    tracing::debug!(count = loaded, "Builtin plugins activated");
    registry
}

/// Owns the plugin manager and lifecycle for one daemon run
#[derive(Debug)]
pub struct Agent {
    config: Config,
    manager: PluginManager,
    lifecycle: Lifecycle,
}

impl Agent {
    /// Create an agent with the builtin plugins
    pub fn new(config: Config) -> Self {
        Self::with_registry(config, builtin_registry())
    }

    /// Create an agent over an activated registry
    pub fn with_registry(config: Config, registry: PluginRegistry) -> Self {
        Self {
            config,
            manager: PluginManager::new(registry),
            lifecycle: Lifecycle::new(),
        }
    }

    /// Lifecycle shared by every plugin instance
    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    /// Set up every plugin, then run until stopped
    ///
    /// Outputs and tunnels are set up first, then inputs; the input side is
    /// marked ready once all setups have returned. Binds that give up are
    /// logged against the instance that started them. On stop, waits for
    /// bind tasks for at most `core.shutdown_timeout`.
    pub async fn run(self) -> anyhow::Result<RunReport> {
        let policy = RetryPolicy::from_config(&self.config.core);
        let bind = BindContext::new(self.lifecycle.clone(), policy);
        let failures = bind.failures();
        let ctx = SetupContext::new(bind.clone());

        let setup = self.manager.setup_all(&self.config, &ctx);
        if setup.started == 0 {
            tracing::warn!("No plugin instances were started");
        }

        self.lifecycle.mark_ready();
        tokio::spawn(SignalHandler::new(self.lifecycle.clone()).run());

        let stopping = self.lifecycle.stopping();
        let mut bind_failures = Vec::new();
        loop {
            tokio::select! {
                _ = stopping.cancelled() => break,
                Some(failure) = failures.next() => {
                    report_bind_failure(&failure);
                    bind_failures.push(failure);
                }
            }
        }
        tracing::info!("Shutting down");

        bind.tracker.close();
        let timeout = self.config.core.shutdown_timeout;
        if tokio::time::timeout(timeout, bind.tracker.wait()).await.is_err() {
            tracing::warn!(
                remaining = bind.tracker.len(),
                "Timed out after {:?} waiting for listeners to close",
                timeout
            );
        }

        while let Some(failure) = failures.try_next() {
            report_bind_failure(&failure);
            bind_failures.push(failure);
        }

        Ok(RunReport {
            setup,
            bind_failures,
        })
    }
}

/// What happened during one [`Agent::run`]
#[derive(Debug)]
pub struct RunReport {
    /// Setup outcome per instance
    pub setup: SetupSummary,
    /// Binds that gave up, in the order they were reported
    pub bind_failures: Vec<BindFailure>,
}

fn report_bind_failure(failure: &BindFailure) {
    match &failure.owner {
        Some(owner) => tracing::error!(
            role = %owner.role,
            plugin = %owner.plugin,
            address = %failure.target,
            error = %failure.error,
            "{} failed to bind {}: {}",
            owner,
            failure.target,
            failure.error
        ),
        None => tracing::error!(
            address = %failure.target,
            error = %failure.error,
            "Failed to bind {}: {}",
            failure.target,
            failure.error
        ),
    }
}
