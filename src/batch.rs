// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::cache::MessagePathCache;
use crate::error::QueryError;
use crate::evaluator::MessagePathDataItem;
use crate::message::MessageEvent;
use crate::Rc;

use std::collections::BTreeMap;

use indexmap::IndexMap;
use serde::Serialize;

/// Messages grouped by the topic they were received on.
pub type MessagesByTopic = BTreeMap<Rc<str>, Vec<Rc<MessageEvent>>>;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageAndData {
    pub message: Rc<MessageEvent>,
    pub queried_data: Rc<[MessagePathDataItem]>,
}

/// Results keyed by path text, in the order the paths were declared.
pub type QueriedDataByPath = IndexMap<Rc<str>, Vec<MessageAndData>>;

/// Evaluate every declared path of `cache` against the messages of its topic.
///
/// * A path that does not parse maps to an empty list.
/// * A valid path whose topic has no entry in `messages_by_topic` is left out.
/// * Otherwise each message of the topic contributes one record, in message
///   order. Messages for which the path yields nothing get an empty list.
///
/// Results go through the cache, so repeated calls with the same message
/// instances share the same `queried_data`.
pub fn decode_messages_by_topic(
    cache: &mut MessagePathCache,
    messages_by_topic: &MessagesByTopic,
) -> Result<QueriedDataByPath, QueryError> {
    let mut result = QueriedDataByPath::new();
    for (path, topic) in cache.path_topics() {
        let Some(topic) = topic else {
            result.insert(path, vec![]);
            continue;
        };
        let Some(messages) = messages_by_topic.get(&topic) else {
            continue;
        };

        let mut records = Vec::with_capacity(messages.len());
        for message in messages {
            let queried_data = cache
                .get(&path, message)?
                .unwrap_or_else(|| Rc::from(Vec::new()));
            records.push(MessageAndData {
                message: message.clone(),
                queried_data,
            });
        }
        result.insert(path, records);
    }
    Ok(result)
}
