use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::trace;

use crate::stage::{Flow, Hook, Stage};

/// How a dispatch ended.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Dispatch<M> {
    /// Every hook continued; this is the message the last one handed on.
    Completed(M),
    /// A hook halted the chain.
    Halted { by: String },
}

impl<M> Dispatch<M> {
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed(_))
    }
}

type Chain<C, M> = Vec<Arc<dyn Hook<C, M>>>;

/// Ordered hook chains keyed by stage.
///
/// The bus is owned by one store root; there is no process-wide registry.
/// Hooks can be added at any time. A dispatch runs over the chain as it was
/// when the dispatch began, so hooks registered mid-dispatch apply to later
/// messages only.
pub struct HookBus<C, M> {
    chains: RwLock<HashMap<Stage, Chain<C, M>>>,
}

impl<C, M> HookBus<C, M>
where
    C: Sync,
    M: Send + 'static,
{
    pub fn new() -> Self {
        Self {
            chains: RwLock::new(HashMap::new()),
        }
    }

    /// Append a hook to the end of `stage`'s chain.
    pub fn register(&self, stage: Stage, hook: Arc<dyn Hook<C, M>>) {
        trace!(%stage, hook = hook.name(), "hook registered");
        self.chains
            .write()
            .expect("hook table lock poisoned")
            .entry(stage)
            .or_default()
            .push(hook);
    }

    /// Number of hooks on `stage`.
    pub fn handler_count(&self, stage: Stage) -> usize {
        self.chains
            .read()
            .expect("hook table lock poisoned")
            .get(&stage)
            .map_or(0, Vec::len)
    }

    /// Hook names on `stage`, in run order.
    pub fn handler_names(&self, stage: Stage) -> Vec<String> {
        self.snapshot(stage)
            .iter()
            .map(|hook| hook.name().to_owned())
            .collect()
    }

    /// Run `stage`'s hooks in order, threading `msg` through them.
    pub async fn dispatch(&self, stage: Stage, ctx: &C, msg: M) -> Dispatch<M> {
        let chain = self.snapshot(stage);
        let mut msg = msg;
        for hook in chain {
            match hook.call(ctx, msg).await {
                Flow::Continue(next) => msg = next,
                Flow::Halt => {
                    trace!(%stage, hook = hook.name(), "dispatch halted");
                    return Dispatch::Halted {
                        by: hook.name().to_owned(),
                    };
                }
            }
        }
        Dispatch::Completed(msg)
    }

    fn snapshot(&self, stage: Stage) -> Chain<C, M> {
        self.chains
            .read()
            .expect("hook table lock poisoned")
            .get(&stage)
            .cloned()
            .unwrap_or_default()
    }
}

impl<C, M> Default for HookBus<C, M>
where
    C: Sync,
    M: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<C, M> std::fmt::Debug for HookBus<C, M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<(Stage, usize)> = match self.chains.read() {
            Ok(chains) => {
                let mut counts: Vec<_> = chains.iter().map(|(s, c)| (*s, c.len())).collect();
                counts.sort();
                counts
            }
            Err(_) => Vec::new(),
        };
        f.debug_struct("HookBus").field("chains", &counts).finish()
    }
}
