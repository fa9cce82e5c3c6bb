//! Maple Bus command codes.

/// Command byte carried in the first header byte of every frame.
///
/// Any byte outside the defined set decodes to [`Command::Unknown`], so
/// decoding is lossless. Build values through [`Command::from`] to keep the
/// mapping canonical.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Request basic device information
    DeviceInfoRequest,
    /// Request extended device information
    ExtDeviceInfoRequest,
    /// Reset the device
    Reset,
    /// Shut the device down
    Shutdown,
    /// Device information response
    DeviceInfo,
    /// Extended device information response
    ExtDeviceInfo,
    /// Acknowledge
    Ack,
    /// Data transfer; carries condition reports and data replies
    DataTransfer,
    /// Request current condition
    GetCondition,
    /// Request memory (media) information
    GetMemoryInfo,
    /// Read a block
    BlockRead,
    /// Write a block
    BlockWrite,
    /// Request the result of the last write
    GetLastError,
    /// Set condition (vibration, LCD, ...)
    SetCondition,
    /// AR gun error response
    ArError,
    /// LCD error response
    LcdError,
    /// File error response
    FileError,
    /// Ask the sender to transmit again
    RequestResend,
    /// Command not understood
    UnknownCommand,
    /// Function code not supported by the device
    FunctionNotSupported,
    /// Invalid / no response marker
    Invalid,
    /// Any other code
    Unknown(u8),
}

impl Command {
    /// Wire value of this command.
    pub const fn code(self) -> u8 {
        match self {
            Command::DeviceInfoRequest => 0x01,
            Command::ExtDeviceInfoRequest => 0x02,
            Command::Reset => 0x03,
            Command::Shutdown => 0x04,
            Command::DeviceInfo => 0x05,
            Command::ExtDeviceInfo => 0x06,
            Command::Ack => 0x07,
            Command::DataTransfer => 0x08,
            Command::GetCondition => 0x09,
            Command::GetMemoryInfo => 0x0A,
            Command::BlockRead => 0x0B,
            Command::BlockWrite => 0x0C,
            Command::GetLastError => 0x0D,
            Command::SetCondition => 0x0E,
            Command::ArError => 0xF9,
            Command::LcdError => 0xFA,
            Command::FileError => 0xFB,
            Command::RequestResend => 0xFC,
            Command::UnknownCommand => 0xFD,
            Command::FunctionNotSupported => 0xFE,
            Command::Invalid => 0xFF,
            Command::Unknown(code) => code,
        }
    }

    /// True for the error responses a device may send instead of data.
    pub const fn is_error_response(self) -> bool {
        matches!(
            self,
            Command::ArError
                | Command::LcdError
                | Command::FileError
                | Command::RequestResend
                | Command::UnknownCommand
                | Command::FunctionNotSupported
                | Command::Invalid
        )
    }
}

impl From<u8> for Command {
    fn from(code: u8) -> Self {
        match code {
            0x01 => Command::DeviceInfoRequest,
            0x02 => Command::ExtDeviceInfoRequest,
            0x03 => Command::Reset,
            0x04 => Command::Shutdown,
            0x05 => Command::DeviceInfo,
            0x06 => Command::ExtDeviceInfo,
            0x07 => Command::Ack,
            0x08 => Command::DataTransfer,
            0x09 => Command::GetCondition,
            0x0A => Command::GetMemoryInfo,
            0x0B => Command::BlockRead,
            0x0C => Command::BlockWrite,
            0x0D => Command::GetLastError,
            0x0E => Command::SetCondition,
            0xF9 => Command::ArError,
            0xFA => Command::LcdError,
            0xFB => Command::FileError,
            0xFC => Command::RequestResend,
            0xFD => Command::UnknownCommand,
            0xFE => Command::FunctionNotSupported,
            0xFF => Command::Invalid,
            other => Command::Unknown(other),
        }
    }
}

impl From<Command> for u8 {
    fn from(command: Command) -> Self {
        command.code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_byte_round_trips() {
        for code in 0..=u8::MAX {
            assert_eq!(Command::from(code).code(), code);
        }
    }

    #[test]
    fn test_known_codes() {
        assert_eq!(Command::from(0x08), Command::DataTransfer);
        assert_eq!(Command::from(0x0A), Command::GetMemoryInfo);
        assert_eq!(Command::from(0x42), Command::Unknown(0x42));
        assert!(Command::FileError.is_error_response());
        assert!(!Command::DataTransfer.is_error_response());
    }
}
