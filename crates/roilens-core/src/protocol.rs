// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Message envelopes exchanged with worker tasks.
//!
//! Every request carries a caller-assigned id; every response echoes it
//! back as `requestId` so replies can be matched regardless of completion
//! order. Workers may also emit unsolicited events (progress reports)
//! that carry no request id at all.
//!
//! On the wire a request looks like `{"type": ..., "id": N, "data": ...}`
//! and a response like `{"type": ..., "requestId": N, ...}`; failures use
//! `{"type": "error", "requestId": N, "error": "..."}`.

use serde::{Deserialize, Serialize};

/// Correlation id assigned per request by the caller side.
pub type RequestId = u64;

/// A request with its correlation id. `R` is a worker-specific enum
/// tagged with `type` and carrying its payload under `data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestEnvelope<R> {
	pub id: RequestId,
	#[serde(flatten)]
	pub request: R,
}

/// A response correlated to an earlier request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope<R> {
	pub request_id: RequestId,
	#[serde(flatten)]
	pub payload: ResponsePayload<R>,
}

impl<R> ResponseEnvelope<R> {
	pub fn ok(request_id: RequestId, result: R) -> Self {
		Self { request_id, payload: ResponsePayload::Result(result) }
	}

	pub fn error(request_id: RequestId, message: impl Into<String>) -> Self {
		Self {
			request_id,
			payload: ResponsePayload::Error(ErrorPayload::Error { error: message.into() }),
		}
	}
}

/// Success or failure body of a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponsePayload<R> {
	Error(ErrorPayload),
	Result(R),
}

impl<R> ResponsePayload<R> {
	pub fn into_result(self) -> Result<R, String> {
		match self {
			ResponsePayload::Result(r) => Ok(r),
			ResponsePayload::Error(ErrorPayload::Error { error }) => Err(error),
		}
	}
}

/// Failure body, tagged `"type": "error"` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ErrorPayload {
	Error { error: String },
}

/// Everything a worker can send back: correlated responses and
/// unsolicited events.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound<Resp, Ev> {
	Response(ResponseEnvelope<Resp>),
	Event(Ev),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	#[serde(tag = "type", content = "data", rename_all = "camelCase")]
	enum TestRequest {
		Ping { payload: String },
	}

	#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
	#[serde(tag = "type", rename_all = "camelCase")]
	enum TestResponse {
		Pong { payload: String },
	}

	#[test]
	fn request_envelope_wire_shape() {
		let envelope = RequestEnvelope {
			id: 3,
			request: TestRequest::Ping { payload: "hi".into() },
		};
		let value = serde_json::to_value(&envelope).unwrap();
		assert_eq!(
			value,
			serde_json::json!({ "id": 3, "type": "ping", "data": { "payload": "hi" } })
		);
		let back: RequestEnvelope<TestRequest> = serde_json::from_value(value).unwrap();
		assert_eq!(back, envelope);
	}

	#[test]
	fn response_envelope_wire_shape() {
		let envelope =
			ResponseEnvelope::ok(7, TestResponse::Pong { payload: "hi".into() });
		let value = serde_json::to_value(&envelope).unwrap();
		assert_eq!(
			value,
			serde_json::json!({ "requestId": 7, "type": "pong", "payload": "hi" })
		);
	}

	#[test]
	fn error_envelope_wire_shape() {
		let envelope: ResponseEnvelope<TestResponse> =
			ResponseEnvelope::error(9, "store unavailable");
		let value = serde_json::to_value(&envelope).unwrap();
		assert_eq!(
			value,
			serde_json::json!({ "requestId": 9, "type": "error", "error": "store unavailable" })
		);
		let back: ResponseEnvelope<TestResponse> = serde_json::from_value(value).unwrap();
		assert_eq!(back.payload.into_result(), Err("store unavailable".to_string()));
	}
}
