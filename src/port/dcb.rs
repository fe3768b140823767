//! Translation of `PortConfiguration` into Windows comm state.
//!
//! `CommState` mirrors the `DCB` structure field for field (bitfields unpacked
//! into named members) and `CommTimeouts` mirrors `COMMTIMEOUTS`. Keeping the
//! mapping on these plain types lets it compile and be tested on every host;
//! the Windows backend converts at the syscall boundary.

use super::error::PortError;
use super::traits::{BaudRate, DataBits, FlowControl, Parity, PortConfiguration, StopBits};
use serde::Serialize;

pub const NOPARITY: u8 = 0;
pub const ODDPARITY: u8 = 1;
pub const EVENPARITY: u8 = 2;
pub const MARKPARITY: u8 = 3;
pub const SPACEPARITY: u8 = 4;

pub const ONESTOPBIT: u8 = 0;
pub const ONE5STOPBITS: u8 = 1;
pub const TWOSTOPBITS: u8 = 2;

pub const DTR_CONTROL_DISABLE: u32 = 0;
pub const DTR_CONTROL_ENABLE: u32 = 1;
pub const RTS_CONTROL_DISABLE: u32 = 0;
pub const RTS_CONTROL_ENABLE: u32 = 1;
pub const RTS_CONTROL_HANDSHAKE: u32 = 2;

pub const XON: u8 = 0x11;
pub const XOFF: u8 = 0x13;

/// Unpacked `DCB`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CommState {
    pub baud_rate: u32,
    pub binary: bool,
    pub parity_check: bool,
    pub outx_cts_flow: bool,
    pub outx_dsr_flow: bool,
    pub dtr_control: u32,
    pub dsr_sensitivity: bool,
    pub tx_continue_on_xoff: bool,
    pub out_x: bool,
    pub in_x: bool,
    pub error_char_enabled: bool,
    pub null_discard: bool,
    pub rts_control: u32,
    pub abort_on_error: bool,
    pub xon_lim: u16,
    pub xoff_lim: u16,
    pub byte_size: u8,
    pub parity: u8,
    pub stop_bits: u8,
    pub xon_char: u8,
    pub xoff_char: u8,
    pub error_char: u8,
    pub eof_char: u8,
    pub evt_char: u8,
}

/// Unpacked `COMMTIMEOUTS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct CommTimeouts {
    pub read_interval: u32,
    pub read_total_multiplier: u32,
    pub read_total_constant: u32,
    pub write_total_multiplier: u32,
    pub write_total_constant: u32,
}

/// Upper bound in milliseconds on a write stalled by flow control.
pub const WRITE_TIMEOUT_MS: u32 = 50;

impl CommTimeouts {
    /// Reads return whatever is queued, immediately, even if that is nothing.
    /// Writes held back by CTS or XOFF complete short after `WRITE_TIMEOUT_MS`.
    pub const NON_BLOCKING: Self = Self {
        read_interval: u32::MAX,
        read_total_multiplier: 0,
        read_total_constant: 0,
        write_total_multiplier: 0,
        write_total_constant: WRITE_TIMEOUT_MS,
    };
}

/// Build the comm state that applies `config` on top of `previous`.
pub fn map_config(config: &PortConfiguration, previous: &CommState) -> Result<CommState, PortError> {
    let rate = config.baud_rate.as_u32();
    if rate == 0 {
        return Err(PortError::BaudRateUnsupported(0));
    }
    // A DCB carries a single speed for both directions.
    if config.effective_input_baud().as_u32() != rate {
        return Err(PortError::InputBaudRateUnsupported);
    }

    let software = config.flow_control == FlowControl::Software;
    let hardware = config.flow_control == FlowControl::Hardware;

    let mut state = *previous;
    state.baud_rate = rate;
    state.binary = true;
    state.parity_check = config.parity != Parity::None;
    state.outx_cts_flow = hardware;
    state.outx_dsr_flow = false;
    state.dtr_control = DTR_CONTROL_ENABLE;
    state.dsr_sensitivity = false;
    state.tx_continue_on_xoff = false;
    state.out_x = software;
    state.in_x = software;
    state.error_char_enabled = false;
    state.null_discard = false;
    state.rts_control = if hardware {
        RTS_CONTROL_HANDSHAKE
    } else {
        RTS_CONTROL_ENABLE
    };
    state.abort_on_error = false;
    state.byte_size = config.data_bits.bits();
    state.parity = match config.parity {
        Parity::None => NOPARITY,
        Parity::Odd => ODDPARITY,
        Parity::Even => EVENPARITY,
        Parity::Mark => MARKPARITY,
        Parity::Space => SPACEPARITY,
    };
    state.stop_bits = match config.stop_bits {
        StopBits::One => ONESTOPBIT,
        StopBits::Two => TWOSTOPBITS,
    };
    state.xon_char = XON;
    state.xoff_char = XOFF;
    Ok(state)
}

impl CommState {
    /// Read the line settings back out of the state.
    ///
    /// Returns `None` for combinations the mapper never produces (1.5 stop
    /// bits, unknown parity codes, out-of-range byte sizes).
    pub fn to_configuration(&self) -> Option<PortConfiguration> {
        let parity = match self.parity {
            NOPARITY => Parity::None,
            ODDPARITY => Parity::Odd,
            EVENPARITY => Parity::Even,
            MARKPARITY => Parity::Mark,
            SPACEPARITY => Parity::Space,
            _ => return None,
        };
        let stop_bits = match self.stop_bits {
            ONESTOPBIT => StopBits::One,
            TWOSTOPBITS => StopBits::Two,
            _ => return None,
        };
        let data_bits = DataBits::try_from(self.byte_size).ok()?;
        let flow_control = if self.out_x && self.in_x {
            FlowControl::Software
        } else if self.outx_cts_flow {
            FlowControl::Hardware
        } else {
            FlowControl::None
        };

        Some(PortConfiguration {
            baud_rate: BaudRate::from(self.baud_rate),
            input_baud_rate: None,
            parity,
            stop_bits,
            data_bits,
            flow_control,
        })
    }
}
