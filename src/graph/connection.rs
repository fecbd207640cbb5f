//! Basic connections (spec.md §3 "Basic connection").

use crate::uid::SocketHandle;

pub(crate) struct ConnectionData {
    pub(crate) output: SocketHandle,
    pub(crate) input: SocketHandle,
}
