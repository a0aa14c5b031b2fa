// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-process duplex channels and the request/response worker handle.
//!
//! A worker runs as a tokio task owning one side of a [`duplex`] pair;
//! the caller wraps the other side in a [`WorkerHandle`], which assigns
//! correlation ids, matches replies to pending requests, enforces
//! per-request deadlines, and fans unsolicited events out to
//! subscribers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{Result, WorkerError};
use crate::protocol::{Outbound, RequestEnvelope, RequestId, ResponsePayload};

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// One side of a bidirectional in-process channel.
pub struct Endpoint<Out, In> {
	tx: mpsc::UnboundedSender<Out>,
	rx: mpsc::UnboundedReceiver<In>,
}

impl<Out, In> Endpoint<Out, In> {
	pub fn send(&self, message: Out) -> Result<()> {
		self.tx.send(message).map_err(|_| WorkerError::ChannelClosed)
	}

	/// Receives the next inbound message, `None` once the peer is gone.
	pub async fn recv(&mut self) -> Option<In> {
		self.rx.recv().await
	}

	/// Splits into raw sender and receiver halves so concurrent request
	/// handlers can each hold a sender.
	pub fn split(self) -> (mpsc::UnboundedSender<Out>, mpsc::UnboundedReceiver<In>) {
		(self.tx, self.rx)
	}
}

/// Creates a connected pair of endpoints. Messages sent on one side
/// arrive on the other in order.
pub fn duplex<A, B>() -> (Endpoint<A, B>, Endpoint<B, A>) {
	let (a_tx, a_rx) = mpsc::unbounded_channel();
	let (b_tx, b_rx) = mpsc::unbounded_channel();
	(Endpoint { tx: a_tx, rx: b_rx }, Endpoint { tx: b_tx, rx: a_rx })
}

/// Endpoint type held by a worker task: sends responses and events,
/// receives enveloped requests.
pub type WorkerEndpoint<Req, Resp, Ev> = Endpoint<Outbound<Resp, Ev>, RequestEnvelope<Req>>;

/// Endpoint type wrapped by [`WorkerHandle`].
pub type CallerEndpoint<Req, Resp, Ev> = Endpoint<RequestEnvelope<Req>, Outbound<Resp, Ev>>;

struct Shared<Resp> {
	next_id: AtomicU64,
	pending: Mutex<HashMap<RequestId, oneshot::Sender<ResponsePayload<Resp>>>>,
}

/// Caller-side handle to a worker task.
///
/// Responses are matched strictly by correlation id; a reply for an id
/// with no pending waiter (a request that already timed out) is dropped
/// with a debug log.
pub struct WorkerHandle<Req, Resp, Ev> {
	tx: mpsc::UnboundedSender<RequestEnvelope<Req>>,
	shared: Arc<Shared<Resp>>,
	events: broadcast::Sender<Ev>,
	dispatcher: JoinHandle<()>,
}

impl<Req, Resp, Ev> WorkerHandle<Req, Resp, Ev>
where
	Req: Send + 'static,
	Resp: Send + 'static,
	Ev: Clone + Send + 'static,
{
	/// Wraps the caller side of a duplex pair, spawning the dispatcher
	/// task that routes replies and events.
	pub fn new(endpoint: CallerEndpoint<Req, Resp, Ev>) -> Self {
		let Endpoint { tx, mut rx } = endpoint;
		let shared = Arc::new(Shared {
			next_id: AtomicU64::new(0),
			pending: Mutex::new(HashMap::new()),
		});
		let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);

		let dispatcher_shared = Arc::clone(&shared);
		let dispatcher_events = events.clone();
		let dispatcher = tokio::spawn(async move {
			while let Some(outbound) = rx.recv().await {
				match outbound {
					Outbound::Response(envelope) => {
						let waiter = dispatcher_shared
							.pending
							.lock()
							.await
							.remove(&envelope.request_id);
						match waiter {
							Some(reply_tx) => {
								let _ = reply_tx.send(envelope.payload);
							}
							None => {
								debug!(
									request_id = envelope.request_id,
									"dropping reply with no pending waiter"
								);
							}
						}
					}
					Outbound::Event(event) => {
						// No subscribers is fine, events are advisory.
						let _ = dispatcher_events.send(event);
					}
				}
			}
			// Worker gone; wake every waiter with a closed-channel error
			// by dropping its reply sender.
			dispatcher_shared.pending.lock().await.clear();
		});

		Self { tx, shared, events, dispatcher }
	}

	/// Sends `request` and awaits its reply, failing after `timeout`.
	///
	/// On timeout the pending slot is removed immediately and the
	/// allocated id is reported in the error so the caller can issue a
	/// cancel notification for it.
	pub async fn request(&self, request: Req, timeout: Duration) -> Result<Resp> {
		let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1;
		let (reply_tx, reply_rx) = oneshot::channel();
		self.shared.pending.lock().await.insert(id, reply_tx);

		if self.tx.send(RequestEnvelope { id, request }).is_err() {
			self.shared.pending.lock().await.remove(&id);
			return Err(WorkerError::ChannelClosed);
		}

		match tokio::time::timeout(timeout, reply_rx).await {
			Ok(Ok(payload)) => payload.into_result().map_err(WorkerError::Remote),
			Ok(Err(_)) => Err(WorkerError::ChannelClosed),
			Err(_) => {
				self.shared.pending.lock().await.remove(&id);
				warn!(request_id = id, timeout_ms = timeout.as_millis() as u64, "worker request timed out");
				Err(WorkerError::Timeout { request_id: id, timeout_ms: timeout.as_millis() as u64 })
			}
		}
	}

	/// Sends `request` without waiting for a reply. Any reply the worker
	/// produces for the returned id is discarded by the dispatcher.
	pub fn notify(&self, request: Req) -> Result<RequestId> {
		let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed) + 1;
		self.tx
			.send(RequestEnvelope { id, request })
			.map_err(|_| WorkerError::ChannelClosed)?;
		Ok(id)
	}

	/// Subscribes to unsolicited worker events. Slow subscribers lag
	/// rather than block the worker.
	pub fn subscribe(&self) -> broadcast::Receiver<Ev> {
		self.events.subscribe()
	}

	/// Whether the dispatcher is still running, i.e. the worker has not
	/// hung up.
	pub fn is_connected(&self) -> bool {
		!self.dispatcher.is_finished()
	}

	#[cfg(test)]
	async fn pending_len(&self) -> usize {
		self.shared.pending.lock().await.len()
	}
}

impl<Req, Resp, Ev> Drop for WorkerHandle<Req, Resp, Ev> {
	fn drop(&mut self) {
		self.dispatcher.abort();
	}
}
