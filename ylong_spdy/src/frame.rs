// Copyright (c) 2023 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Frame model of the SPDY-style wire protocol.
//!
//! Every frame starts with an 8-byte common header. Control frames carry the
//! control bit, a 15-bit protocol version, a 16-bit type, an 8-bit flags
//! field and a 24-bit payload length. Data frames carry a 31-bit stream id in
//! place of the version/type pair.

use crate::error::ResetStatus;
use crate::headers::NvBlock;

/// Stream identifier, 31 bits on the wire.
pub type StreamId = u32;

/// Protocol version carried by every control frame.
pub const SPDY_VERSION: u16 = 2;

/// Largest stream id representable on the wire.
pub const MAX_STREAM_ID: StreamId = (1 << 31) - 1;

/// Frame type of `SYN_STREAM`.
pub const SYN_STREAM_TYPE: u16 = 1;
/// Frame type of `SYN_REPLY`.
pub const SYN_REPLY_TYPE: u16 = 2;
/// Frame type of `RST_STREAM`.
pub const RST_STREAM_TYPE: u16 = 3;
/// Frame type of `SETTINGS`.
pub const SETTINGS_TYPE: u16 = 4;
/// Frame type of `NOOP`.
pub const NOOP_TYPE: u16 = 5;
/// Frame type of `PING`. Recognized but not processed by this client.
pub const PING_TYPE: u16 = 6;
/// Frame type of `GOAWAY`.
pub const GOAWAY_TYPE: u16 = 7;
/// Frame type of `HEADERS`. Recognized but not processed by this client.
pub const HEADERS_TYPE: u16 = 8;
/// Frame type of `WINDOW_UPDATE`.
pub const WINDOW_UPDATE_TYPE: u16 = 9;

pub(crate) const FIN_MASK: u8 = 0x01;
pub(crate) const UNIDIRECTIONAL_MASK: u8 = 0x02;
pub(crate) const CLEAR_SETTINGS_MASK: u8 = 0x01;

/// Per-setting flag requesting that the receiver persist the value.
pub const SETTING_FLAG_PLEASE_PERSIST: u8 = 0x01;
/// Per-setting flag marking a value replayed from persisted state.
pub const SETTING_FLAG_PERSISTED: u8 = 0x02;

/// A complete frame: stream id (0 for session-scoped control frames), flags
/// and a type-specific payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    id: StreamId,
    flags: FrameFlags,
    payload: Payload,
}

/// Type-specific frame payloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// `SYN_STREAM`, opening a stream and carrying its request headers.
    SynStream(SynStream),

    /// `SYN_REPLY`, the header reply for a stream.
    SynReply(SynReply),

    /// `RST_STREAM`, terminating a single stream.
    RstStream(RstStream),

    /// `SETTINGS`, session-scoped configuration exchange.
    Settings(Settings),

    /// `GOAWAY`, graceful session retirement.
    Goaway(Goaway),

    /// `WINDOW_UPDATE`, per-stream flow-control credit.
    WindowUpdate(WindowUpdate),

    /// A data frame, one chunk of stream payload.
    Data(Data),
}

/// The 8-bit flags field of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameFlags(u8);

impl Frame {
    /// Creates a `Frame`.
    pub fn new(id: StreamId, flags: FrameFlags, payload: Payload) -> Self {
        Frame { id, flags, payload }
    }

    /// Returns the stream id of the frame. Session-scoped control frames
    /// (`SETTINGS`, `GOAWAY`) use id 0.
    pub fn stream_id(&self) -> StreamId {
        self.id
    }

    /// Returns the flags of the frame.
    pub fn flags(&self) -> &FrameFlags {
        &self.flags
    }

    /// Returns the payload of the frame.
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Returns a mutable reference to the payload of the frame.
    pub fn payload_mut(&mut self) -> &mut Payload {
        &mut self.payload
    }

    /// Consumes the frame and returns its parts.
    pub fn into_parts(self) -> (StreamId, FrameFlags, Payload) {
        (self.id, self.flags, self.payload)
    }

    /// Whether the payload carries a header block compressed through the
    /// shared session context. Such frames must be serialized in exactly the
    /// order they are transmitted.
    pub fn is_compressible(&self) -> bool {
        matches!(
            self.payload,
            Payload::SynStream(_) | Payload::SynReply(_)
        )
    }
}

impl FrameFlags {
    /// Creates `FrameFlags` from raw bits.
    pub fn new(flags: u8) -> Self {
        FrameFlags(flags)
    }

    /// Creates an empty `FrameFlags`.
    pub fn empty() -> Self {
        FrameFlags(0)
    }

    /// Returns the raw bits of the flags.
    pub fn bits(&self) -> u8 {
        self.0
    }

    /// Whether the FIN flag is set. FIN marks the final frame the sender
    /// will transmit on the stream.
    pub fn is_fin(&self) -> bool {
        self.0 & FIN_MASK == FIN_MASK
    }

    /// Sets or clears the FIN flag.
    pub fn set_fin(&mut self, fin: bool) {
        if fin {
            self.0 |= FIN_MASK;
        } else {
            self.0 &= !FIN_MASK;
        }
    }

    /// Whether the UNIDIRECTIONAL flag is set on a stream-open frame.
    pub fn is_unidirectional(&self) -> bool {
        self.0 & UNIDIRECTIONAL_MASK == UNIDIRECTIONAL_MASK
    }

    /// Sets the UNIDIRECTIONAL flag.
    pub fn set_unidirectional(&mut self, unidirectional: bool) {
        if unidirectional {
            self.0 |= UNIDIRECTIONAL_MASK;
        } else {
            self.0 &= !UNIDIRECTIONAL_MASK;
        }
    }

    /// Whether a `SETTINGS` frame asks the receiver to clear previously
    /// persisted settings.
    pub fn is_clear_settings(&self) -> bool {
        self.0 & CLEAR_SETTINGS_MASK == CLEAR_SETTINGS_MASK
    }
}

/// Discrete stream priority levels, highest first. The wire carries the
/// level in the top 2 bits of the `SYN_STREAM` priority field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    /// Serviced before everything else.
    Highest = 0,
    /// Above-normal priority.
    Medium = 1,
    /// Below-normal priority.
    Low = 2,
    /// Serviced last.
    Lowest = 3,
}

impl Priority {
    /// Number of discrete priority levels.
    pub const LEVELS: usize = 4;

    /// Returns the 2-bit wire encoding of the level.
    pub fn bits(self) -> u8 {
        self as u8
    }

    /// Builds a level from its 2-bit wire encoding.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0x3 {
            0 => Priority::Highest,
            1 => Priority::Medium,
            2 => Priority::Low,
            _ => Priority::Lowest,
        }
    }

    /// Returns the level as an array index, highest level first.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Payload of a `SYN_STREAM` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynStream {
    associated_id: StreamId,
    priority: Priority,
    headers: NvBlock,
}

impl SynStream {
    /// Creates a `SynStream` payload.
    pub fn new(associated_id: StreamId, priority: Priority, headers: NvBlock) -> Self {
        Self {
            associated_id,
            priority,
            headers,
        }
    }

    /// Returns the associated stream id, 0 when the stream is independent.
    pub fn associated_id(&self) -> StreamId {
        self.associated_id
    }

    /// Returns the priority of the stream.
    pub fn priority(&self) -> Priority {
        self.priority
    }

    /// Returns the header block.
    pub fn headers(&self) -> &NvBlock {
        &self.headers
    }

    /// Consumes the payload and returns the header block.
    pub fn into_headers(self) -> NvBlock {
        self.headers
    }
}

/// Payload of a `SYN_REPLY` frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynReply {
    headers: NvBlock,
}

impl SynReply {
    /// Creates a `SynReply` payload.
    pub fn new(headers: NvBlock) -> Self {
        Self { headers }
    }

    /// Returns the header block.
    pub fn headers(&self) -> &NvBlock {
        &self.headers
    }

    /// Consumes the payload and returns the header block.
    pub fn into_headers(self) -> NvBlock {
        self.headers
    }
}

/// Payload of a `RST_STREAM` frame. The wire payload is exactly 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RstStream {
    status: ResetStatus,
}

impl RstStream {
    /// Creates a `RstStream` payload.
    pub fn new(status: ResetStatus) -> Self {
        Self { status }
    }

    /// Returns the status code.
    pub fn status(&self) -> ResetStatus {
        self.status
    }

    /// Whether the reset represents a local cancellation rather than a
    /// peer-observed failure.
    pub fn is_cancel(&self) -> bool {
        self.status == ResetStatus::Cancel
    }
}

/// Identifiers of `SETTINGS` entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingId {
    /// Expected upload bandwidth hint.
    UploadBandwidth = 1,
    /// Expected download bandwidth hint.
    DownloadBandwidth = 2,
    /// Expected round-trip time hint.
    RoundTripTime = 3,
    /// Maximum concurrent streams the sender will accept.
    MaxConcurrentStreams = 4,
    /// Current congestion window hint.
    CurrentCwnd = 5,
    /// Download retransmission rate hint.
    DownloadRetransRate = 6,
    /// Initial per-stream flow-control window.
    InitialWindowSize = 7,
}

impl SettingId {
    /// Parses a 24-bit wire identifier.
    pub fn from_wire(id: u32) -> Option<Self> {
        match id {
            1 => Some(Self::UploadBandwidth),
            2 => Some(Self::DownloadBandwidth),
            3 => Some(Self::RoundTripTime),
            4 => Some(Self::MaxConcurrentStreams),
            5 => Some(Self::CurrentCwnd),
            6 => Some(Self::DownloadRetransRate),
            7 => Some(Self::InitialWindowSize),
            _ => None,
        }
    }

    /// Returns the wire identifier.
    pub fn into_wire(self) -> u32 {
        self as u32
    }
}

/// One `SETTINGS` entry: identifier, per-entry flags and value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingEntry {
    id: SettingId,
    flags: u8,
    value: u32,
}

impl SettingEntry {
    /// Creates an entry with no flags.
    pub fn new(id: SettingId, value: u32) -> Self {
        Self { id, flags: 0, value }
    }

    /// Creates an entry with explicit flags.
    pub fn with_flags(id: SettingId, flags: u8, value: u32) -> Self {
        Self { id, flags, value }
    }

    /// Returns the identifier of the entry.
    pub fn id(&self) -> SettingId {
        self.id
    }

    /// Returns the per-entry flags.
    pub fn flags(&self) -> u8 {
        self.flags
    }

    /// Returns the value of the entry.
    pub fn value(&self) -> u32 {
        self.value
    }

    /// Whether the sender asks for this value to be persisted.
    pub fn please_persist(&self) -> bool {
        self.flags & SETTING_FLAG_PLEASE_PERSIST != 0
    }

    /// Whether this value was replayed from persisted state.
    pub fn persisted(&self) -> bool {
        self.flags & SETTING_FLAG_PERSISTED != 0
    }

    /// Returns a copy of the entry with the persist-request flag cleared and
    /// the persisted flag set, the form in which values are replayed.
    pub fn as_persisted(&self) -> Self {
        Self {
            id: self.id,
            flags: (self.flags & !SETTING_FLAG_PLEASE_PERSIST) | SETTING_FLAG_PERSISTED,
            value: self.value,
        }
    }
}

/// Payload of a `SETTINGS` frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Settings {
    entries: Vec<SettingEntry>,
}

impl Settings {
    /// Creates a `Settings` payload from entries.
    pub fn new(entries: Vec<SettingEntry>) -> Self {
        Self { entries }
    }

    /// Returns the entries of the payload.
    pub fn entries(&self) -> &[SettingEntry] {
        &self.entries
    }

    /// Returns the value of an entry by identifier.
    pub fn get(&self, id: SettingId) -> Option<u32> {
        self.entries
            .iter()
            .find(|entry| entry.id == id)
            .map(|entry| entry.value)
    }

    /// Whether the payload carries no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Creates a `SettingsBuilder`.
    pub fn build() -> SettingsBuilder {
        SettingsBuilder { entries: vec![] }
    }
}

/// A builder of `Settings`.
///
/// # Examples
///
/// ```
/// use ylong_spdy::frame::Settings;
///
/// let settings = Settings::build()
///     .max_concurrent_streams(100)
///     .initial_window_size(65536)
///     .finish();
/// assert_eq!(settings.entries().len(), 2);
/// ```
pub struct SettingsBuilder {
    entries: Vec<SettingEntry>,
}

impl SettingsBuilder {
    /// Appends a maximum-concurrent-streams entry.
    pub fn max_concurrent_streams(mut self, value: u32) -> Self {
        self.entries
            .push(SettingEntry::new(SettingId::MaxConcurrentStreams, value));
        self
    }

    /// Appends an initial-window-size entry.
    pub fn initial_window_size(mut self, value: u32) -> Self {
        self.entries
            .push(SettingEntry::new(SettingId::InitialWindowSize, value));
        self
    }

    /// Appends an arbitrary entry.
    pub fn entry(mut self, entry: SettingEntry) -> Self {
        self.entries.push(entry);
        self
    }

    /// Finishes the payload.
    pub fn finish(self) -> Settings {
        Settings {
            entries: self.entries,
        }
    }
}

/// Payload of a `GOAWAY` frame. The wire payload is exactly 4 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Goaway {
    last_accepted_id: StreamId,
}

impl Goaway {
    /// Creates a `Goaway` payload.
    pub fn new(last_accepted_id: StreamId) -> Self {
        Self { last_accepted_id }
    }

    /// Returns the last stream id the sender will process.
    pub fn last_accepted_id(&self) -> StreamId {
        self.last_accepted_id
    }
}

/// Payload of a `WINDOW_UPDATE` frame. The wire payload is exactly 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowUpdate {
    delta: u32,
}

impl WindowUpdate {
    /// Creates a `WindowUpdate` payload.
    pub fn new(delta: u32) -> Self {
        Self { delta }
    }

    /// Returns the raw credit delta.
    pub fn delta(&self) -> u32 {
        self.delta
    }

    /// Returns the delta reinterpreted as a signed quantity, the form in
    /// which the non-positive-delta violation is checked.
    pub fn signed_delta(&self) -> i32 {
        self.delta as i32
    }
}

/// Payload of a data frame. The decoder may deliver one wire frame as
/// several `Data` chunks; the FIN flag is reported with the final chunk.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Data {
    data: Vec<u8>,
}

impl Data {
    /// Creates a `Data` payload.
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    /// Returns the payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Returns the size of the payload.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Consumes the payload and returns its bytes.
    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }
}
