//! Built-in hooks.
//!
//! Storage, networking and query delivery are all plain hooks on the store's
//! bus; the store itself only dispatches.

pub mod boot;
pub mod inbound;
pub mod outbound;
pub mod storage;

use std::sync::Arc;

use graft_bus::Stage;
use graft_store::StorageAdapter;

use crate::graft::Graft;

pub use boot::{BootHook, ConnectHook};
pub use inbound::{
    DecodeHook, DedupHook, NotifyHook, RepliesHook, ResolveHook, RetransmitHook, StampHook,
    WriteHook,
};
pub use outbound::{EncodeHook, FanOutHook};
pub use storage::{EchoHook, StorageReadHook, StorageWriteHook};

/// Register the built-in hooks on a fresh store.
pub(crate) fn install(graft: &Graft, storage: Option<Arc<dyn StorageAdapter>>) {
    graft.register(Stage::Create, Arc::new(BootHook));
    graft.register(Stage::Opt, Arc::new(ConnectHook));

    graft.register(Stage::In, Arc::new(DecodeHook));
    graft.register(Stage::In, Arc::new(StampHook));
    graft.register(Stage::In, Arc::new(DedupHook));
    graft.register(Stage::In, Arc::new(RetransmitHook));
    graft.register(Stage::In, Arc::new(RepliesHook));
    graft.register(Stage::In, Arc::new(NotifyHook));
    graft.register(Stage::In, Arc::new(ResolveHook));
    graft.register(Stage::In, Arc::new(WriteHook));

    graft.register(Stage::Out, Arc::new(EncodeHook));
    graft.register(Stage::Out, Arc::new(FanOutHook));

    if let Some(adapter) = storage {
        graft.register(Stage::Get, Arc::new(StorageReadHook::new(Arc::clone(&adapter))));
        graft.register(Stage::Put, Arc::new(StorageWriteHook::new(adapter)));
    }
    graft.register(Stage::Put, Arc::new(EchoHook));
}
