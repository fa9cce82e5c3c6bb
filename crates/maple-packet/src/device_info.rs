//! Device identification payloads.
//!
//! A device info reply is 28 words: the function code, three function
//! definition words, then a packed block of region, connection direction,
//! description, producer and current draw. The extended reply appends an
//! 80-byte version string, 48 words in total.

use maple_errors::CodecError;

use crate::FunctionCode;
use crate::reader::FrameReader;

/// Words in a device info payload.
pub const DEVICE_INFO_WORDS: usize = 28;
/// Words in an extended device info payload.
pub const EXT_DEVICE_INFO_WORDS: usize = 48;
/// Description field length in bytes.
pub const DESCRIPTION_LEN: usize = 30;
/// Producer field length in bytes.
pub const PRODUCER_LEN: usize = 60;
/// Extended version field length in bytes.
pub const VERSION_LEN: usize = 80;

const INFO_BYTES: usize = DEVICE_INFO_WORDS * 4;

/// Region byte accepted by every console region.
pub const REGION_ALL: u8 = 0xFF;
/// Producer string of first-party peripherals.
pub const SEGA_PRODUCER: &str = "Produced By or Under License From SEGA ENTERPRISES,LTD.";

/// Decoded device information block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Functions supported by the device
    pub function_code: FunctionCode,
    /// One definition word per function, highest function first
    pub function_definitions: [u32; 3],
    /// Region mask
    pub region: u8,
    /// Connector direction
    pub connection_direction: u8,
    /// Space padded ASCII product name
    pub description: [u8; DESCRIPTION_LEN],
    /// Space padded ASCII producer name
    pub producer: [u8; PRODUCER_LEN],
    /// Standby current in 0.1 mA
    pub standby_current: u16,
    /// Maximum current in 0.1 mA
    pub max_current: u16,
}

impl DeviceInfo {
    /// Device info with region-free defaults and typical controller current
    /// draw (43.0 mA standby, 50.0 mA max).
    pub fn new(
        function_code: FunctionCode,
        function_definitions: [u32; 3],
        description: &str,
        producer: &str,
    ) -> Self {
        Self {
            function_code,
            function_definitions,
            region: REGION_ALL,
            connection_direction: 0,
            description: pad_ascii(description),
            producer: pad_ascii(producer),
            standby_current: 0x01AE,
            max_current: 0x01F4,
        }
    }

    /// Description with trailing padding removed.
    pub fn description_str(&self) -> &str {
        trim_ascii(&self.description)
    }

    /// Producer with trailing padding removed.
    pub fn producer_str(&self) -> &str {
        trim_ascii(&self.producer)
    }

    fn byte_stream(&self) -> impl Iterator<Item = u8> + '_ {
        self.function_code
            .bits()
            .to_be_bytes()
            .into_iter()
            .chain(self.function_definitions.iter().flat_map(|d| d.to_be_bytes()))
            .chain([self.region, self.connection_direction])
            .chain(self.description.iter().copied())
            .chain(self.producer.iter().copied())
            .chain(self.standby_current.to_le_bytes())
            .chain(self.max_current.to_le_bytes())
    }

    /// Payload words for a device info reply.
    pub fn to_words(&self) -> [u32; DEVICE_INFO_WORDS] {
        pack_words(self.byte_stream())
    }

    /// Payload words for an extended device info reply carrying `version`.
    pub fn to_ext_words(&self, version: &str) -> [u32; EXT_DEVICE_INFO_WORDS] {
        let version: [u8; VERSION_LEN] = pad_ascii(version);
        pack_words(self.byte_stream().chain(version))
    }

    /// Parse the leading 28 words of a (possibly extended) device info payload.
    ///
    /// # Errors
    ///
    /// [`CodecError::Framing`] if fewer than 28 words are supplied.
    pub fn from_words(words: &[u32]) -> Result<Self, CodecError> {
        if words.len() < DEVICE_INFO_WORDS {
            return Err(CodecError::Framing {
                expected: INFO_BYTES,
                actual: words.len().saturating_mul(4),
            });
        }
        let mut bytes = [0u8; INFO_BYTES];
        for (slot, b) in bytes.iter_mut().zip(unpack_bytes(words)) {
            *slot = b;
        }

        let mut reader = FrameReader::new(&bytes);
        let function_code = FunctionCode(reader.read_u32_be()?);
        let function_definitions = [
            reader.read_u32_be()?,
            reader.read_u32_be()?,
            reader.read_u32_be()?,
        ];
        let region = reader.read_u8()?;
        let connection_direction = reader.read_u8()?;
        let description = reader.read_array::<DESCRIPTION_LEN>()?;
        let producer = reader.read_array::<PRODUCER_LEN>()?;
        let standby_current = u16::from_le_bytes(reader.read_array::<2>()?);
        let max_current = u16::from_le_bytes(reader.read_array::<2>()?);

        Ok(Self {
            function_code,
            function_definitions,
            region,
            connection_direction,
            description,
            producer,
            standby_current,
            max_current,
        })
    }

    /// Definition word for `function`, if the device advertises it.
    pub fn definition_for(&self, function: FunctionCode) -> Option<u32> {
        let index = self.function_code.definition_index(function)?;
        self.function_definitions.get(index).copied()
    }
}

/// Version string carried by an extended device info payload.
pub fn ext_version(words: &[u32]) -> Option<[u8; VERSION_LEN]> {
    if words.len() < EXT_DEVICE_INFO_WORDS {
        return None;
    }
    let mut version = [b' '; VERSION_LEN];
    for (slot, b) in version
        .iter_mut()
        .zip(unpack_bytes(words).skip(INFO_BYTES))
    {
        *slot = b;
    }
    Some(version)
}

/// Copy `text` into a space padded ASCII field, truncating if needed.
/// Non-ASCII characters become `?`.
pub fn pad_ascii<const N: usize>(text: &str) -> [u8; N] {
    let mut out = [b' '; N];
    for (slot, c) in out.iter_mut().zip(text.chars()) {
        *slot = if c.is_ascii() { c as u8 } else { b'?' };
    }
    out
}

/// View of a padded field with trailing spaces and NULs removed.
pub fn trim_ascii(field: &[u8]) -> &str {
    core::str::from_utf8(field)
        .unwrap_or_default()
        .trim_end_matches([' ', '\0'])
}

fn pack_words<const W: usize>(bytes: impl IntoIterator<Item = u8>) -> [u32; W] {
    let mut words = [0u32; W];
    let mut bytes = bytes.into_iter();
    for word in &mut words {
        for _ in 0..4 {
            *word = (*word << 8) | u32::from(bytes.next().unwrap_or(0));
        }
    }
    words
}

fn unpack_bytes(words: &[u32]) -> impl Iterator<Item = u8> + '_ {
    words.iter().flat_map(|w| w.to_be_bytes())
}
