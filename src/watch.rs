//! Watch loop: re-run the pipeline that owns each changed file.
//!
//! ```text
//! notify ─ events ─ Dispatcher ─ route(path) ─┬─ styles worker    ─ run_pipeline(styles)
//!                                              ├─ scripts worker   ─ run_pipeline(scripts)
//!                                              ├─ images worker    ─ run_pipeline(images)
//!                                              └─ generator worker ─ build()
//! ```
//!
//! One recursive watcher covers the whole project root. Each event path is
//! routed through the [`AssetRegistry`](crate::registry::AssetRegistry), so
//! writes into `assets/`, `_site/`, the cache directory and `.git/` never
//! trigger anything.
//!
//! Every group has one worker task. After the first change it waits out the
//! debounce window, drains whatever else queued up, and runs once. Changes
//! that arrive while a run is in progress queue up and cause exactly one
//! follow-up run.

use crate::orchestrator::Orchestrator;
use crate::types::GroupKind;
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

#[derive(Error, Debug)]
pub enum WatchError {
    #[error("file watcher error: {0}")]
    Notify(#[from] notify::Error),
}

/// A group's link to its worker task.
pub struct WatchSubscription {
    pub kind: GroupKind,
    sender: UnboundedSender<PathBuf>,
}

/// Routes filesystem events to the per-group workers.
pub struct Dispatcher {
    orchestrator: Orchestrator,
    subscriptions: Vec<WatchSubscription>,
}

impl Dispatcher {
    /// Spawn one worker per group on the current runtime.
    pub fn spawn(orchestrator: &Orchestrator, debounce: Duration) -> Self {
        let subscriptions = GroupKind::ALL
            .into_iter()
            .map(|kind| {
                let (sender, changes) = unbounded_channel();
                tokio::spawn(group_worker(orchestrator.clone(), kind, changes, debounce));
                WatchSubscription { kind, sender }
            })
            .collect();
        Self {
            orchestrator: orchestrator.clone(),
            subscriptions,
        }
    }

    /// Route one event. Returns how many (path, group) pairs were queued.
    pub fn dispatch(&self, event: &Event) -> usize {
        if matches!(event.kind, EventKind::Access(_)) {
            return 0;
        }
        let registry = &self.orchestrator.context().registry;
        let mut queued = 0;
        for path in &event.paths {
            for kind in registry.route(path) {
                if let Some(sub) = self.subscriptions.iter().find(|s| s.kind == kind)
                    && sub.sender.send(path.clone()).is_ok()
                {
                    queued += 1;
                }
            }
        }
        queued
    }
}

async fn group_worker(
    orchestrator: Orchestrator,
    kind: GroupKind,
    mut changes: UnboundedReceiver<PathBuf>,
    debounce: Duration,
) {
    while let Some(first) = changes.recv().await {
        tokio::time::sleep(debounce).await;
        let mut coalesced = 1;
        while changes.try_recv().is_ok() {
            coalesced += 1;
        }
        tracing::info!(
            group = %kind,
            changes = coalesced,
            "changed: {}",
            first
                .strip_prefix(&orchestrator.context().root)
                .unwrap_or(&first)
                .display()
        );
        orchestrator.run_group(kind).await;
    }
}

/// Watch the project root and re-run pipelines until the process exits.
pub async fn watch(orchestrator: Orchestrator) -> Result<(), WatchError> {
    let ctx = orchestrator.context().clone();
    let debounce = Duration::from_millis(ctx.config.watch.debounce_ms);
    let dispatcher = Dispatcher::spawn(&orchestrator, debounce);

    let (events_tx, mut events) = unbounded_channel::<notify::Result<Event>>();
    let mut watcher = notify::recommended_watcher(move |res| {
        let _ = events_tx.send(res);
    })?;
    watcher.watch(&ctx.root, RecursiveMode::Recursive)?;

    crate::output::log_lines(crate::output::format_watch_banner(
        ctx.registry.groups(),
        &ctx.root,
    ));

    while let Some(event) = events.recv().await {
        match event {
            Ok(event) => {
                dispatcher.dispatch(&event);
            }
            Err(e) => tracing::warn!("watch error: {e}"),
        }
    }
    Ok(())
}
