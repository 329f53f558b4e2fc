use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// A named interception point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// A store root was constructed.
    Create,
    /// Options are being applied (peers connected, listeners bound).
    Opt,
    /// A message entered the store, locally or from a peer.
    In,
    /// A message is leaving for peers.
    Out,
    /// A record is being fetched from storage.
    Get,
    /// A record is being written to storage.
    Put,
}

impl Stage {
    pub const ALL: [Stage; 6] = [
        Stage::Create,
        Stage::Opt,
        Stage::In,
        Stage::Out,
        Stage::Get,
        Stage::Put,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Opt => "opt",
            Self::In => "in",
            Self::Out => "out",
            Self::Get => "get",
            Self::Put => "put",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| format!("unknown stage '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// Flow
// ---------------------------------------------------------------------------

/// What a hook wants the bus to do next.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flow<M> {
    /// Run the next hook with this message.
    Continue(M),
    /// Stop here; later hooks do not run.
    Halt,
}

impl<M> Flow<M> {
    pub fn is_halt(&self) -> bool {
        matches!(self, Self::Halt)
    }
}

// ---------------------------------------------------------------------------
// Hook trait
// ---------------------------------------------------------------------------

/// A single handler on a stage.
///
/// `C` is the store root the hook acts on; it is passed explicitly to every
/// call. `M` is the stage message. Errors are the hook's own business: the
/// bus does not catch or report them.
#[async_trait]
pub trait Hook<C, M>: Send + Sync
where
    C: Sync,
    M: Send + 'static,
{
    /// Short name used in logs and [`crate::Dispatch::Halted`].
    fn name(&self) -> &str;

    async fn call(&self, ctx: &C, msg: M) -> Flow<M>;
}

/// A hook that looks at every message and always continues.
pub struct Observer<F> {
    name: String,
    f: F,
}

impl<F> Observer<F> {
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

#[async_trait]
impl<C, M, F> Hook<C, M> for Observer<F>
where
    C: Sync,
    M: Send + 'static,
    F: Fn(&C, &M) + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, ctx: &C, msg: M) -> Flow<M> {
        (self.f)(ctx, &msg);
        Flow::Continue(msg)
    }
}
