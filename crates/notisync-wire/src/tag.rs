//! The TLV tag space shared by every structure this crate encodes.

use caret::caret_int;

caret_int! {
    /// A TLV type tag used throughout the reconciliation engine's wire format.
    ///
    /// Unrecognized tags are preserved rather than rejected at this layer: callers decide
    /// whether an unknown tag is fatal for the structure they're parsing.
    pub struct Tag(u64) {
        /// Deprecated: a pre-sketch reply format, retained only so old encodings are
        /// recognizable as such rather than silently misparsed.
        LEGACY_REPLY = 128,
        /// `NotificationList`: a sequence of `EventEntry` blocks.
        NOTIFICATION_LIST = 130,
        /// `EventEntry`: one timestamp plus the event names published at it.
        EVENT_ENTRY = 132,
        /// `Timestamp`: a non-negative integer reconciliation key.
        TIMESTAMP = 133,
        /// `DataEntry`: one opaque data item (reserved for the `DataContainer` variant).
        DATA_ENTRY = 135,
        /// `DataList`: a sequence of `DataEntry` blocks.
        DATA_LIST = 136,
        /// `NotificationDataReply`: the outer envelope, a `Type` followed by one container.
        NOTIFICATION_DATA_REPLY = 134,
        /// `Type`: discriminates the envelope's container (1 = data, 2 = events).
        TYPE = 137,
        /// `IBFEntry` field: cell count, carried as the same non-negative-integer TLV used
        /// everywhere else (a negative count is the reinterpreted `u64` bit pattern; see
        /// `WireCell::count`).
        IBF_COUNT = 138,
        /// `IBFEntry` field: XOR-accumulated key sum.
        IBF_KEY_SUM = 139,
        /// `IBFEntry` field: XOR-accumulated key check hash.
        IBF_KEY_CHECK = 140,
        /// `IBFEntry` field: XOR-accumulated value sum.
        IBF_VALUE_SUM = 141,
        /// `IBFEntry` field: the cell's index within the table.
        IBF_INDEX = 142,
        /// `IBFEntry` when nested inside an `IBFTable`; `IBFTable` itself when top-level.
        ///
        /// The two meanings share a tag value and are disambiguated by nesting position,
        /// matching the wire format this crate's sketch encoding is derived from.
        IBF_ENTRY_OR_TABLE = 143,
        /// `ListEntry`: one timestamp in the plain-list state encoding.
        LIST_ENTRY = 144,
        /// `ListTable`: a sequence of `ListEntry` blocks.
        LIST_TABLE = 145,
    }
}

/// Discriminates the container carried by a [`crate::DataEnvelope`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum EnvelopeType {
    /// Opaque data items, keyed only by their position.
    DataContainer,
    /// Event names keyed by the timestamp they were published at.
    EventsContainer,
}

impl EnvelopeType {
    /// The wire value for this variant.
    pub fn wire_value(self) -> u64 {
        match self {
            EnvelopeType::DataContainer => 1,
            EnvelopeType::EventsContainer => 2,
        }
    }

    /// Recover a variant from its wire value.
    pub fn from_wire_value(v: u64) -> Option<Self> {
        match v {
            1 => Some(EnvelopeType::DataContainer),
            2 => Some(EnvelopeType::EventsContainer),
            _ => None,
        }
    }
}
