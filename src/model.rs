/// Raw status byte returned by the printer query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterStatus {
    Fail,
    OnePass,
    TwoPass,
    MaybeBusy,
    Unknown(u8),
}

impl PrinterStatus {
    pub fn from_code(code: u8) -> Self {
        match code {
            0x00 => Self::Fail,
            0x01 => Self::OnePass,
            0x02 => Self::TwoPass,
            0x03 => Self::MaybeBusy,
            _ => Self::Unknown(code),
        }
    }

    /// Resolve the status into a printer model.
    ///
    /// "Maybe busy" is reported by single pass printers in practice, so it
    /// is treated as one. Anything else that is not a model means no printer.
    pub fn printer_type(self) -> Option<PrinterType> {
        match self {
            Self::OnePass | Self::MaybeBusy => Some(PrinterType::OnePass),
            Self::TwoPass => Some(PrinterType::TwoPass),
            Self::Fail | Self::Unknown(_) => None,
        }
    }
}

/// The two printer models the laptop can drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterType {
    /// Takes a dithered row in one transit: packets then a bulk byte tail.
    OnePass,
    /// Takes each bitplane of a row in its own transit, ended by CR or CR+LF.
    TwoPass,
}
