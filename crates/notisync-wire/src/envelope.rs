//! `NotificationDataReply`: the payload carried by a reply to an outstanding request.

use std::collections::BTreeMap;

use notisync_bytes::{EncodeResult, Reader, Result, Writer};

use crate::name::EventName;
use crate::tag::{EnvelopeType, Tag};
use crate::tlv::{parse_elements, read_u64_body, write_tlv, write_tlv_u64};

/// The reply payload for one satisfied request.
///
/// `EventsContainer` is the only variant this engine's reconciliation path produces today;
/// `DataContainer` is carried opaquely for callers that push arbitrary payloads outside the
/// timestamp-keyed event path (see the `DataEntry`/`DataList` tags).
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum DataEnvelope {
    /// Timestamp-keyed event names: the normal reconciliation reply.
    Events(BTreeMap<u64, Vec<EventName>>),
    /// Opaque data items, order-preserved but otherwise unkeyed.
    Data(Vec<Vec<u8>>),
}

impl DataEnvelope {
    /// This envelope's discriminant.
    fn envelope_type(&self) -> EnvelopeType {
        match self {
            DataEnvelope::Events(_) => EnvelopeType::EventsContainer,
            DataEnvelope::Data(_) => EnvelopeType::DataContainer,
        }
    }

    /// Encode this envelope as a standalone byte buffer.
    pub fn encode(&self) -> EncodeResult<Vec<u8>> {
        let mut body = Vec::new();
        write_tlv_u64(&mut body, Tag::TYPE, self.envelope_type().wire_value())?;

        match self {
            DataEnvelope::Events(events) => {
                let mut list_body = Vec::new();
                for (ts, names) in events {
                    let mut entry_body = Vec::new();
                    write_tlv_u64(&mut entry_body, Tag::TIMESTAMP, *ts)?;
                    for name in names {
                        let mut name_bytes = Vec::new();
                        name.write_onto(&mut name_bytes)?;
                        write_tlv(&mut entry_body, Tag::EVENT_ENTRY, &name_bytes)?;
                    }
                    write_tlv(&mut list_body, Tag::EVENT_ENTRY, &entry_body)?;
                }
                write_tlv(&mut body, Tag::NOTIFICATION_LIST, &list_body)?;
            }
            DataEnvelope::Data(items) => {
                let mut list_body = Vec::new();
                for item in items {
                    write_tlv(&mut list_body, Tag::DATA_ENTRY, item)?;
                }
                write_tlv(&mut body, Tag::DATA_LIST, &list_body)?;
            }
        }

        let mut out = Vec::new();
        write_tlv(&mut out, Tag::NOTIFICATION_DATA_REPLY, &body)?;
        Ok(out)
    }

    /// Decode an envelope previously produced by [`DataEnvelope::encode`].
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Reader::from_slice(bytes);
        let outer = parse_elements(&mut r)?;
        let envelope = outer
            .iter()
            .find(|e| e.tag == Tag::NOTIFICATION_DATA_REPLY)
            .ok_or_else(|| {
                notisync_bytes::Error::InvalidMessage("missing NotificationDataReply".into())
            })?;

        let mut inner_r = Reader::from_slice(envelope.body);
        let inner = parse_elements(&mut inner_r)?;

        let type_elem = inner
            .iter()
            .find(|e| e.tag == Tag::TYPE)
            .ok_or_else(|| notisync_bytes::Error::InvalidMessage("missing Type".into()))?;
        let envelope_type = EnvelopeType::from_wire_value(read_u64_body(type_elem.body)?)
            .ok_or_else(|| notisync_bytes::Error::InvalidMessage("unknown Type value".into()))?;

        match envelope_type {
            EnvelopeType::EventsContainer => {
                let list = inner
                    .iter()
                    .find(|e| e.tag == Tag::NOTIFICATION_LIST)
                    .ok_or_else(|| {
                        notisync_bytes::Error::InvalidMessage("missing NotificationList".into())
                    })?;
                let mut events = BTreeMap::new();
                let mut list_r = Reader::from_slice(list.body);
                for entry in parse_elements(&mut list_r)? {
                    if entry.tag != Tag::EVENT_ENTRY {
                        continue;
                    }
                    let mut entry_r = Reader::from_slice(entry.body);
                    let fields = parse_elements(&mut entry_r)?;
                    let ts_field = fields
                        .iter()
                        .find(|f| f.tag == Tag::TIMESTAMP)
                        .ok_or_else(|| {
                            notisync_bytes::Error::InvalidMessage("EventEntry missing Timestamp".into())
                        })?;
                    let ts = read_u64_body(ts_field.body)?;
                    let mut names = Vec::new();
                    for f in fields.iter().filter(|f| f.tag == Tag::EVENT_ENTRY) {
                        let mut name_r = Reader::from_slice(f.body);
                        names.push(EventName::take_from(&mut name_r)?);
                    }
                    events.insert(ts, names);
                }
                Ok(DataEnvelope::Events(events))
            }
            EnvelopeType::DataContainer => {
                let list = inner
                    .iter()
                    .find(|e| e.tag == Tag::DATA_LIST)
                    .ok_or_else(|| {
                        notisync_bytes::Error::InvalidMessage("missing DataList".into())
                    })?;
                let mut items = Vec::new();
                let mut list_r = Reader::from_slice(list.body);
                for entry in parse_elements(&mut list_r)? {
                    if entry.tag == Tag::DATA_ENTRY {
                        items.push(entry.body.to_vec());
                    }
                }
                Ok(DataEnvelope::Data(items))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_roundtrip() {
        let mut events = BTreeMap::new();
        events.insert(10, vec![EventName::parse("/s/e/a/1")]);
        events.insert(20, vec![EventName::parse("/s/e/b/2"), EventName::parse("/s/e/c/3")]);
        let env = DataEnvelope::Events(events.clone());

        let encoded = env.encode().unwrap();
        let decoded = DataEnvelope::decode(&encoded).unwrap();
        assert_eq!(decoded, DataEnvelope::Events(events));
    }

    #[test]
    fn data_roundtrip() {
        let env = DataEnvelope::Data(vec![b"one".to_vec(), b"two".to_vec()]);
        let encoded = env.encode().unwrap();
        let decoded = DataEnvelope::decode(&encoded).unwrap();
        assert_eq!(decoded, env);
    }
}
