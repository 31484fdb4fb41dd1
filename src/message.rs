// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::value::Value;
use crate::Rc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Receive timestamp of a message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Time {
    pub sec: u32,
    pub nsec: u32,
}

/// A single message received on a topic.
///
/// The cache memoizes by message identity, so events are normally shared as
/// `Rc<MessageEvent>` and handed to the engine repeatedly across frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEvent {
    pub topic: Rc<str>,
    pub receive_time: Time,
    pub message: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_in_bytes: Option<usize>,
}

impl MessageEvent {
    pub fn new(topic: &str, receive_time: Time, message: Value) -> Self {
        Self {
            topic: topic.into(),
            receive_time,
            message,
            size_in_bytes: None,
        }
    }

    pub fn from_json_str(json: &str) -> Result<MessageEvent> {
        Ok(serde_json::from_str(json)?)
    }
}
