// Copyright 2026 the Arbor Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Blocking request/reply between the GUI thread and the render thread.
//!
//! [`Requester::call`] hands a request to the other side and parks until a
//! reply arrives. Every request carries its own one-slot reply channel, so a
//! [`Reply`] that is dropped without being sent (the render thread bailed
//! out, or unwound) wakes the caller with an error instead of leaving it
//! parked forever.

use crossbeam::channel::{self, Receiver, Sender};

/// The other side of a rendezvous went away.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("rendezvous peer disconnected")]
pub(crate) struct Disconnected;

/// Creates a connected requester/responder pair.
pub(crate) fn rendezvous<Req, Resp>() -> (Requester<Req, Resp>, Responder<Req, Resp>) {
    let (tx, rx) = channel::unbounded();
    (Requester { tx }, Responder { rx })
}

/// The blocking side, held by the GUI thread.
#[derive(Debug)]
pub(crate) struct Requester<Req, Resp> {
    tx: Sender<(Req, Reply<Resp>)>,
}

impl<Req, Resp> Requester<Req, Resp> {
    /// Sends `request` and waits for its reply.
    pub(crate) fn call(&self, request: Req) -> Result<Resp, Disconnected> {
        let (tx, rx) = channel::bounded(1);
        self.tx
            .send((request, Reply { tx }))
            .map_err(|_| Disconnected)?;
        rx.recv().map_err(|_| Disconnected)
    }
}

/// The serving side, held by the render thread.
#[derive(Debug)]
pub(crate) struct Responder<Req, Resp> {
    rx: Receiver<(Req, Reply<Resp>)>,
}

impl<Req, Resp> Responder<Req, Resp> {
    /// Waits for the next request. `None` once every requester is gone.
    pub(crate) fn recv(&self) -> Option<(Req, Reply<Resp>)> {
        self.rx.recv().ok()
    }
}

/// Wakes the caller of one [`Requester::call`].
#[derive(Debug)]
pub(crate) struct Reply<Resp> {
    tx: Sender<Resp>,
}

impl<Resp> Reply<Resp> {
    /// Delivers the response. A caller that stopped waiting is ignored.
    pub(crate) fn send(self, response: Resp) {
        let _ = self.tx.send(response);
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;

    #[test]
    fn call_blocks_until_reply() {
        let (requester, responder) = rendezvous::<u32, u32>();
        let server = thread::spawn(move || {
            while let Some((n, reply)) = responder.recv() {
                reply.send(n * 2);
            }
        });
        assert_eq!(requester.call(21), Ok(42));
        assert_eq!(requester.call(5), Ok(10));
        drop(requester);
        server.join().unwrap();
    }

    #[test]
    fn dropped_reply_wakes_caller() {
        let (requester, responder) = rendezvous::<(), ()>();
        let server = thread::spawn(move || {
            let (_, reply) = responder.recv().unwrap();
            drop(reply);
        });
        assert_eq!(requester.call(()), Err(Disconnected));
        server.join().unwrap();
        assert_eq!(requester.call(()), Err(Disconnected));
    }
}
