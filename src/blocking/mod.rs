//! Synchronous wrappers for callers without an async runtime of their own.
//!
//! Every call drives the underlying future on a shared multi-threaded Tokio runtime. Do not call
//! these from inside another Tokio runtime; use the async API there.

use std::future::Future;

use once_cell::sync::OnceCell;
use tokio::runtime::Runtime;

use crate::remote_config::error::{internal_error, RemoteConfigResult};

macro_rules! block_on_methods {
    ($(fn $name:ident($($arg:ident : $ty:ty),*) -> $ret:ty);* $(;)?) => {
        $(pub fn $name(&self, $($arg:$ty),*) -> $ret {
            $crate::blocking::block_on(self.inner.$name($($arg),*))
        })*
    };
}

pub mod remote_config;

static RT: OnceCell<Runtime> = OnceCell::new();

fn runtime() -> RemoteConfigResult<&'static Runtime> {
    RT.get_or_try_init(|| {
        tokio::runtime::Builder::new_multi_thread()
            .enable_all() // timer, I/O
            .thread_name("remote-config-blocking")
            .build()
    })
    .map_err(|err| internal_error(format!("failed to start blocking runtime: {err}")))
}

fn block_on<F, T>(fut: F) -> RemoteConfigResult<T>
where
    F: Future<Output = RemoteConfigResult<T>>,
{
    runtime()?.block_on(fut)
}
