//! LightControl Binary Codec
//!
//! Every frame is a single tag byte followed by a fixed-layout payload.
//! Numeric fields are little-endian; there are no length prefixes apart
//! from the node count of a NodeInfo package.
//!
//! ```text
//! ┌──────────┬──────────────────────────────────────────┐
//! │ Byte 0   │ PackageType tag                          │
//! ├──────────┼──────────────────────────────────────────┤
//! │ Byte 1.. │ Payload (layout per package type)        │
//! └──────────┴──────────────────────────────────────────┘
//! ```

use crate::types::*;
use crate::{Error, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::error;

/// Size of one node record inside a NodeInfo package
pub const NODE_INFO_CHUNK_SIZE: usize = 113;

/// Capacity of the fixed node name buffer
pub const MAX_NODE_NAME_LEN: usize = 20;

// ============================================================================
// TRAITS
// ============================================================================

/// Outbound message: can be serialized to a complete frame
pub trait Compose {
    const PACKAGE_TYPE: PackageType;

    /// Payload size without the tag byte
    fn payload_len(&self) -> usize;

    fn encode_payload(&self, buf: &mut BytesMut);

    /// Tag byte followed by the payload
    fn compose(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(1 + self.payload_len());
        buf.put_u8(Self::PACKAGE_TYPE.as_u8());
        self.encode_payload(&mut buf);
        buf.freeze()
    }
}

/// Inbound message: can be read from a payload whose tag was already consumed
pub trait Decode: Sized {
    const PACKAGE_TYPE: PackageType;

    /// Smallest payload this variant can be decoded from
    const MIN_SIZE: usize;

    /// Read the payload. Called only once `MIN_SIZE` bytes are known to be present.
    fn decode_payload(buf: &mut &[u8]) -> Result<Self>;

    /// Decode and advance the cursor past the consumed bytes
    fn decode(buf: &mut &[u8]) -> Result<Self> {
        ensure(buf, Self::PACKAGE_TYPE, Self::MIN_SIZE)?;
        Self::decode_payload(buf)
    }

    /// Decode from the start of `bytes`, returning the number of bytes consumed
    fn decode_with_len(bytes: &[u8]) -> Result<(Self, usize)> {
        let mut buf = bytes;
        let value = Self::decode(&mut buf)?;
        Ok((value, bytes.len() - buf.remaining()))
    }
}

#[inline]
fn ensure(buf: &&[u8], kind: PackageType, needed: usize) -> Result<()> {
    if buf.remaining() < needed {
        return Err(Error::InvalidMessageSize {
            kind,
            needed,
            have: buf.remaining(),
        });
    }
    Ok(())
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Decode a complete frame (tag + payload)
pub fn decode(bytes: &[u8]) -> Result<Message> {
    if bytes.is_empty() {
        return Err(Error::EmptyFrame);
    }

    let mut buf = bytes;
    let tag = buf.get_u8();
    let kind = PackageType::from_u8(tag).ok_or(Error::UnknownPackageType(tag))?;
    decode_payload(kind, &mut buf)
}

/// Decode the payload of a frame whose tag has already been read
pub fn decode_payload(kind: PackageType, buf: &mut &[u8]) -> Result<Message> {
    match kind {
        PackageType::LightMode => LightMode::decode(buf).map(Message::LightMode),
        PackageType::Strobe => Strobe::decode(buf).map(Message::Strobe),
        PackageType::Glitter => Glitter::decode(buf).map(Message::Glitter),
        PackageType::Pulse => Pulse::decode(buf).map(Message::Pulse),
        PackageType::Rainbow => Rainbow::decode(buf).map(Message::Rainbow),
        PackageType::RunningSections => {
            RunningSections::decode(buf).map(Message::RunningSections)
        }
        PackageType::OnBoardLedStrength => {
            OnBoardLedStrength::decode(buf).map(Message::OnBoardLedStrength)
        }
        PackageType::NodeInfo => NodeList::decode(buf).map(Message::NodeInfo),
        PackageType::FrequencyInfo
        | PackageType::Samples
        | PackageType::TetrisMove
        | PackageType::WifiSettings
        | PackageType::ScanWifi
        | PackageType::OtaData
        | PackageType::Ping
        | PackageType::GameOfLifeSettings
        | PackageType::FrequencySettings => Err(Error::Unhandled(kind)),
    }
}

impl Message {
    /// Compose an outbound frame. NodeInfo is inbound only.
    pub fn compose(&self) -> Result<Bytes> {
        match self {
            Message::LightMode(m) => Ok(m.compose()),
            Message::Strobe(m) => Ok(m.compose()),
            Message::Glitter(m) => Ok(m.compose()),
            Message::Pulse(m) => Ok(m.compose()),
            Message::Rainbow(m) => Ok(m.compose()),
            Message::RunningSections(m) => Ok(m.compose()),
            Message::OnBoardLedStrength(m) => Ok(m.compose()),
            Message::NodeInfo(_) => Err(Error::NotComposable(PackageType::NodeInfo)),
        }
    }
}

// ============================================================================
// FIXED LAYOUT MESSAGES
// ============================================================================

impl Compose for LightMode {
    const PACKAGE_TYPE: PackageType = PackageType::LightMode;

    fn payload_len(&self) -> usize {
        8
    }

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_u8(self.mode);
        buf.put_f32_le(self.strength);
        buf.put_u8(self.r);
        buf.put_u8(self.g);
        buf.put_u8(self.b);
    }
}

impl Decode for LightMode {
    const PACKAGE_TYPE: PackageType = PackageType::LightMode;
    const MIN_SIZE: usize = 8;

    fn decode_payload(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            mode: buf.get_u8(),
            strength: buf.get_f32_le(),
            r: buf.get_u8(),
            g: buf.get_u8(),
            b: buf.get_u8(),
        })
    }
}

impl Compose for Strobe {
    const PACKAGE_TYPE: PackageType = PackageType::Strobe;

    fn payload_len(&self) -> usize {
        8
    }

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.on_time_us);
        buf.put_u32_le(self.off_time_us);
    }
}

impl Decode for Strobe {
    const PACKAGE_TYPE: PackageType = PackageType::Strobe;
    const MIN_SIZE: usize = 8;

    fn decode_payload(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            on_time_us: buf.get_u32_le(),
            off_time_us: buf.get_u32_le(),
        })
    }
}

impl Compose for Glitter {
    const PACKAGE_TYPE: PackageType = PackageType::Glitter;

    fn payload_len(&self) -> usize {
        9
    }

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.update_rate_us);
        buf.put_u8(self.random_color as u8);
        buf.put_f32_le(self.percent_on);
    }
}

impl Decode for Glitter {
    const PACKAGE_TYPE: PackageType = PackageType::Glitter;
    const MIN_SIZE: usize = 9;

    fn decode_payload(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            update_rate_us: buf.get_u32_le(),
            random_color: buf.get_u8() != 0,
            percent_on: buf.get_f32_le(),
        })
    }
}

impl Compose for Pulse {
    const PACKAGE_TYPE: PackageType = PackageType::Pulse;

    fn payload_len(&self) -> usize {
        6
    }

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.pulse_time_ms);
        buf.put_i8(self.direction as i8);
        buf.put_u8(self.single_shot as u8);
    }
}

impl Decode for Pulse {
    const PACKAGE_TYPE: PackageType = PackageType::Pulse;
    const MIN_SIZE: usize = 6;

    fn decode_payload(buf: &mut &[u8]) -> Result<Self> {
        let pulse_time_ms = buf.get_u32_le();
        let direction = PulseDirection::try_from(buf.get_i8()).map_err(|v| {
            Error::InvalidValue {
                field: "pulse direction",
                value: v as i64,
            }
        })?;
        let single_shot = buf.get_u8() != 0;

        Ok(Self {
            pulse_time_ms,
            direction,
            single_shot,
        })
    }
}

impl Compose for Rainbow {
    const PACKAGE_TYPE: PackageType = PackageType::Rainbow;

    fn payload_len(&self) -> usize {
        4
    }

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.update_rate_ms);
    }
}

impl Decode for Rainbow {
    const PACKAGE_TYPE: PackageType = PackageType::Rainbow;
    const MIN_SIZE: usize = 4;

    fn decode_payload(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            update_rate_ms: buf.get_u32_le(),
        })
    }
}

impl Compose for RunningSections {
    const PACKAGE_TYPE: PackageType = PackageType::RunningSections;

    fn payload_len(&self) -> usize {
        12
    }

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_u32_le(self.update_rate_ms);
        buf.put_u32_le(self.section_count);
        buf.put_u32_le(self.section_size);
    }
}

impl Decode for RunningSections {
    const PACKAGE_TYPE: PackageType = PackageType::RunningSections;
    const MIN_SIZE: usize = 12;

    fn decode_payload(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            update_rate_ms: buf.get_u32_le(),
            section_count: buf.get_u32_le(),
            section_size: buf.get_u32_le(),
        })
    }
}

impl Compose for OnBoardLedStrength {
    const PACKAGE_TYPE: PackageType = PackageType::OnBoardLedStrength;

    fn payload_len(&self) -> usize {
        4
    }

    fn encode_payload(&self, buf: &mut BytesMut) {
        buf.put_f32_le(self.strength);
    }
}

impl Decode for OnBoardLedStrength {
    const PACKAGE_TYPE: PackageType = PackageType::OnBoardLedStrength;
    const MIN_SIZE: usize = 1;

    // Inbound strength is a single byte, unlike the 4-byte float we send.
    fn decode_payload(buf: &mut &[u8]) -> Result<Self> {
        Ok(Self {
            strength: buf.get_u8() as f32,
        })
    }
}

// ============================================================================
// NODE INFO
// ============================================================================

impl Decode for NodeList {
    const PACKAGE_TYPE: PackageType = PackageType::NodeInfo;
    const MIN_SIZE: usize = 4;

    fn decode_payload(buf: &mut &[u8]) -> Result<Self> {
        let declared = buf.get_u32_le() as usize;
        let expected = declared.saturating_mul(NODE_INFO_CHUNK_SIZE);

        if expected != buf.remaining() {
            error!(
                "NodeInfo size mismatch: {} nodes need {} bytes, have {}",
                declared,
                expected,
                buf.remaining()
            );
        }

        let available = buf.remaining() / NODE_INFO_CHUNK_SIZE;
        let count = declared.min(available);
        let mut nodes = Vec::with_capacity(count);

        for _ in 0..count {
            let current: &[u8] = *buf;
            let (chunk, rest) = current.split_at(NODE_INFO_CHUNK_SIZE);
            nodes.push(decode_node(chunk));
            *buf = rest;
        }

        Ok(NodeList { nodes })
    }
}

/// Read one fixed-size node record. `chunk` is exactly `NODE_INFO_CHUNK_SIZE` bytes.
fn decode_node(mut chunk: &[u8]) -> NodeInfo {
    let mut mac = [0u8; 6];
    chunk.copy_to_slice(&mut mac);
    let mut parent_mac = [0u8; 6];
    chunk.copy_to_slice(&mut parent_mac);
    let node_time = chunk.get_f64_le();
    chunk.advance(4);

    let name_len = (chunk.get_u8() as usize).min(MAX_NODE_NAME_LEN);
    let raw_name = &chunk[..MAX_NODE_NAME_LEN];
    let raw_name = &raw_name[..name_len];
    let end = raw_name.iter().position(|&b| b == 0).unwrap_or(name_len);
    let name = String::from_utf8_lossy(&raw_name[..end]).into_owned();
    chunk.advance(MAX_NODE_NAME_LEN);

    let board_type = chunk.get_u8();
    chunk.advance(4);
    chunk.advance(2 + 2);
    let local_light_mode = chunk.get_u8();
    let is_global_mode = chunk.get_u8() != 0;
    let layer = chunk.get_u8();
    // Panel dimensions, then the two ring setting blocks
    chunk.advance(4);
    chunk.advance(20 + 20);
    let light_type = chunk.get_u8();

    NodeInfo {
        mac: MacAddress(mac),
        parent_mac: MacAddress(parent_mac),
        node_time,
        name,
        board_type,
        local_light_mode,
        is_global_mode,
        layer,
        light_type,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_light_mode_layout() {
        let frame = LightMode::color(255, 128, 0).compose();
        assert_eq!(frame.len(), 9);
        assert_eq!(frame[0], PackageType::LightMode.as_u8());
        assert_eq!(frame[1], light_mode::ON);
        assert_eq!(&frame[2..6], &1.0f32.to_le_bytes());
        assert_eq!(&frame[6..], &[255, 128, 0]);
    }

    #[test]
    fn test_decode_with_len_reports_consumed() {
        let payload = [0x10, 0x27, 0, 0, 0xff, 0xff, 0xff];
        let (rainbow, used) = Rainbow::decode_with_len(&payload).unwrap();
        assert_eq!(rainbow.update_rate_ms, 10_000);
        assert_eq!(used, 4);
    }

    #[test]
    fn test_undersized_payload() {
        let mut buf: &[u8] = &[1, 2, 3];
        let err = RunningSections::decode(&mut buf).unwrap_err();
        assert_eq!(
            err,
            Error::InvalidMessageSize {
                kind: PackageType::RunningSections,
                needed: 12,
                have: 3,
            }
        );
        // Cursor untouched on failure
        assert_eq!(buf.len(), 3);
    }

    #[test]
    fn test_pulse_rejects_bad_direction() {
        let mut buf: &[u8] = &[0, 0, 0, 0, 5, 0];
        assert!(matches!(
            Pulse::decode(&mut buf),
            Err(Error::InvalidValue { value: 5, .. })
        ));
    }

    #[test]
    fn test_node_info_is_not_composable() {
        let msg = Message::NodeInfo(NodeList::default());
        assert_eq!(
            msg.compose(),
            Err(Error::NotComposable(PackageType::NodeInfo))
        );
    }

    #[test]
    fn test_decode_empty_and_unknown() {
        assert_eq!(decode(&[]), Err(Error::EmptyFrame));
        assert_eq!(decode(&[0xee]), Err(Error::UnknownPackageType(0xee)));
        assert_eq!(
            decode(&[PackageType::Ping.as_u8()]),
            Err(Error::Unhandled(PackageType::Ping))
        );
    }
}
