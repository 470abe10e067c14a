//! LightControl message types
//!
//! The package type table must match the firmware's table; values are
//! stable and must not be renumbered.

use std::fmt;

/// Leading tag byte of every wire message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PackageType {
    LightMode = 0,
    Strobe = 1,
    Glitter = 2,
    Pulse = 3,
    Rainbow = 4,
    RunningSections = 5,
    FrequencyInfo = 6,
    Samples = 7,
    OnBoardLedStrength = 8,
    TetrisMove = 9,
    NodeInfo = 10,
    WifiSettings = 11,
    ScanWifi = 12,
    OtaData = 13,
    Ping = 14,
    GameOfLifeSettings = 15,
    FrequencySettings = 16,
}

impl PackageType {
    pub fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(PackageType::LightMode),
            1 => Some(PackageType::Strobe),
            2 => Some(PackageType::Glitter),
            3 => Some(PackageType::Pulse),
            4 => Some(PackageType::Rainbow),
            5 => Some(PackageType::RunningSections),
            6 => Some(PackageType::FrequencyInfo),
            7 => Some(PackageType::Samples),
            8 => Some(PackageType::OnBoardLedStrength),
            9 => Some(PackageType::TetrisMove),
            10 => Some(PackageType::NodeInfo),
            11 => Some(PackageType::WifiSettings),
            12 => Some(PackageType::ScanWifi),
            13 => Some(PackageType::OtaData),
            14 => Some(PackageType::Ping),
            15 => Some(PackageType::GameOfLifeSettings),
            16 => Some(PackageType::FrequencySettings),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Whether inbound frames of this type carry a modeled payload.
    ///
    /// The remaining types are recognized but dropped on receive.
    pub fn is_modeled(self) -> bool {
        match self {
            PackageType::LightMode
            | PackageType::Strobe
            | PackageType::Glitter
            | PackageType::Pulse
            | PackageType::Rainbow
            | PackageType::RunningSections
            | PackageType::OnBoardLedStrength
            | PackageType::NodeInfo => true,
            PackageType::FrequencyInfo
            | PackageType::Samples
            | PackageType::TetrisMove
            | PackageType::WifiSettings
            | PackageType::ScanWifi
            | PackageType::OtaData
            | PackageType::Ping
            | PackageType::GameOfLifeSettings
            | PackageType::FrequencySettings => false,
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PackageType::LightMode => "LightMode",
            PackageType::Strobe => "Strobe",
            PackageType::Glitter => "Glitter",
            PackageType::Pulse => "Pulse",
            PackageType::Rainbow => "Rainbow",
            PackageType::RunningSections => "RunningSections",
            PackageType::FrequencyInfo => "FrequencyInfo",
            PackageType::Samples => "Samples",
            PackageType::OnBoardLedStrength => "OnBoardLEDStrength",
            PackageType::TetrisMove => "TetrisMove",
            PackageType::NodeInfo => "NodeInfo",
            PackageType::WifiSettings => "WifiSettings",
            PackageType::ScanWifi => "ScanWifi",
            PackageType::OtaData => "OtaData",
            PackageType::Ping => "Ping",
            PackageType::GameOfLifeSettings => "GameOfLifeSettings",
            PackageType::FrequencySettings => "FrequencySettings",
        };
        f.write_str(name)
    }
}

/// Light mode codes carried in [`LightMode::mode`]
pub mod light_mode {
    pub const OFF: u8 = 0;
    pub const ON: u8 = 1;
    pub const STROBE: u8 = 2;
    pub const GLITTER: u8 = 3;
    pub const PULSE: u8 = 4;
    pub const RAINBOW: u8 = 5;
    pub const RUNNING_SECTIONS: u8 = 6;
    pub const FREQUENCY: u8 = 7;
    pub const TETRIS: u8 = 8;
    pub const GAME_OF_LIFE: u8 = 9;
}

/// Global light mode with a static color
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LightMode {
    pub mode: u8,
    pub strength: f32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl LightMode {
    /// Static color at full strength
    pub fn color(r: u8, g: u8, b: u8) -> Self {
        Self {
            mode: light_mode::ON,
            strength: 1.0,
            r,
            g,
            b,
        }
    }

    pub fn off() -> Self {
        Self {
            mode: light_mode::OFF,
            strength: 0.0,
            r: 0,
            g: 0,
            b: 0,
        }
    }

    pub fn with_strength(mut self, strength: f32) -> Self {
        self.strength = strength;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Strobe {
    pub on_time_us: u32,
    pub off_time_us: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Glitter {
    pub update_rate_us: u32,
    pub random_color: bool,
    pub percent_on: f32,
}

/// Travel direction of a pulse
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(i8)]
pub enum PulseDirection {
    Inward = -1,
    #[default]
    Both = 0,
    Outward = 1,
}

impl TryFrom<i8> for PulseDirection {
    type Error = i8;

    fn try_from(value: i8) -> std::result::Result<Self, Self::Error> {
        match value {
            -1 => Ok(PulseDirection::Inward),
            0 => Ok(PulseDirection::Both),
            1 => Ok(PulseDirection::Outward),
            other => Err(other),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulse {
    pub pulse_time_ms: u32,
    pub direction: PulseDirection,
    pub single_shot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rainbow {
    pub update_rate_ms: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunningSections {
    pub update_rate_ms: u32,
    pub section_count: u32,
    pub section_size: u32,
}

/// Brightness of the on-board debug LED
///
/// Composed as a 4-byte float but decoded from a single byte; the
/// firmware's expectation for the inbound width is unconfirmed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OnBoardLedStrength {
    pub strength: f32,
}

/// 48-bit hardware address of a mesh node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MacAddress(pub [u8; 6]);

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

/// One node of the mesh as reported by the node we are connected to
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeInfo {
    pub mac: MacAddress,
    pub parent_mac: MacAddress,
    pub node_time: f64,
    pub name: String,
    pub board_type: u8,
    pub local_light_mode: u8,
    pub is_global_mode: bool,
    pub layer: u8,
    pub light_type: u8,
}

/// Inbound NodeInfo package: every node currently known to the mesh
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NodeList {
    pub nodes: Vec<NodeInfo>,
}

/// A decoded LightControl message
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    LightMode(LightMode),
    Strobe(Strobe),
    Glitter(Glitter),
    Pulse(Pulse),
    Rainbow(Rainbow),
    RunningSections(RunningSections),
    OnBoardLedStrength(OnBoardLedStrength),
    NodeInfo(NodeList),
}

impl Message {
    pub fn package_type(&self) -> PackageType {
        match self {
            Message::LightMode(_) => PackageType::LightMode,
            Message::Strobe(_) => PackageType::Strobe,
            Message::Glitter(_) => PackageType::Glitter,
            Message::Pulse(_) => PackageType::Pulse,
            Message::Rainbow(_) => PackageType::Rainbow,
            Message::RunningSections(_) => PackageType::RunningSections,
            Message::OnBoardLedStrength(_) => PackageType::OnBoardLedStrength,
            Message::NodeInfo(_) => PackageType::NodeInfo,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_type_table_is_stable() {
        for tag in 0..=16u8 {
            let ty = PackageType::from_u8(tag).unwrap();
            assert_eq!(ty.as_u8(), tag);
        }
        assert_eq!(PackageType::from_u8(17), None);
        assert_eq!(PackageType::NodeInfo.as_u8(), 10);
        assert_eq!(PackageType::OnBoardLedStrength.as_u8(), 8);
    }

    #[test]
    fn test_pulse_direction_range() {
        assert_eq!(PulseDirection::try_from(-1), Ok(PulseDirection::Inward));
        assert_eq!(PulseDirection::try_from(1), Ok(PulseDirection::Outward));
        assert_eq!(PulseDirection::try_from(2), Err(2));
    }

    #[test]
    fn test_mac_display() {
        let mac = MacAddress([0x24, 0x0a, 0xc4, 0x00, 0x01, 0xff]);
        assert_eq!(mac.to_string(), "24:0a:c4:00:01:ff");
    }
}
