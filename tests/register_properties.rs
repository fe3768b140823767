//! Property tests for the register mappers.
//!
//! Both mappers are pure functions of (configuration, previous image), so they
//! can be driven with arbitrary line settings without a device.

use proptest::prelude::*;
use serialpoll::port::dcb::{self, CommState};
use serialpoll::port::{
    BaudRate, DataBits, FlowControl, Parity, PortConfiguration, PortError, StopBits,
};

fn parity() -> impl Strategy<Value = Parity> {
    prop_oneof![
        Just(Parity::None),
        Just(Parity::Odd),
        Just(Parity::Even),
        Just(Parity::Mark),
        Just(Parity::Space),
    ]
}

fn stop_bits() -> impl Strategy<Value = StopBits> {
    prop_oneof![Just(StopBits::One), Just(StopBits::Two)]
}

fn data_bits() -> impl Strategy<Value = DataBits> {
    prop_oneof![
        Just(DataBits::Five),
        Just(DataBits::Six),
        Just(DataBits::Seven),
        Just(DataBits::Eight),
    ]
}

fn flow_control() -> impl Strategy<Value = FlowControl> {
    prop_oneof![
        Just(FlowControl::None),
        Just(FlowControl::Software),
        Just(FlowControl::Hardware),
    ]
}

/// Tabulated rates and arbitrary ones, weighted toward the table.
fn baud_rate() -> impl Strategy<Value = BaudRate> {
    prop_oneof![
        3 => proptest::sample::select(BaudRate::STANDARD.to_vec()),
        1 => (1u32..4_000_000).prop_map(BaudRate::from),
    ]
}

prop_compose! {
    fn single_rate_config()(
        rate in baud_rate(),
        parity in parity(),
        stop_bits in stop_bits(),
        data_bits in data_bits(),
        flow in flow_control(),
    ) -> PortConfiguration {
        PortConfiguration::new(rate)
            .with_parity(parity)
            .with_stop_bits(stop_bits)
            .with_data_bits(data_bits)
            .with_flow_control(flow)
    }
}

prop_compose! {
    fn previous_state()(
        baud_rate in any::<u32>(),
        flags in any::<[bool; 12]>(),
        xon_lim in any::<u16>(),
        xoff_lim in any::<u16>(),
        byte_size in 4u8..=8,
        parity in 0u8..=4,
        stop_bits in 0u8..=2,
        chars in any::<[u8; 6]>(),
    ) -> CommState {
        CommState {
            baud_rate,
            binary: flags[0],
            parity_check: flags[1],
            outx_cts_flow: flags[2],
            outx_dsr_flow: flags[3],
            dtr_control: flags[4] as u32,
            dsr_sensitivity: flags[5],
            tx_continue_on_xoff: flags[6],
            out_x: flags[7],
            in_x: flags[8],
            error_char_enabled: flags[9],
            null_discard: flags[10],
            rts_control: 0,
            abort_on_error: flags[11],
            xon_lim,
            xoff_lim,
            byte_size,
            parity,
            stop_bits,
            xon_char: chars[0],
            xoff_char: chars[1],
            error_char: chars[2],
            eof_char: chars[3],
            evt_char: chars[4],
        }
    }
}

proptest! {
    #[test]
    fn comm_state_reads_back(config in single_rate_config(), previous in previous_state()) {
        let state = dcb::map_config(&config, &previous).unwrap();
        prop_assert_eq!(state.to_configuration(), Some(config));
    }

    #[test]
    fn comm_state_is_idempotent(config in single_rate_config(), previous in previous_state()) {
        let once = dcb::map_config(&config, &previous).unwrap();
        let twice = dcb::map_config(&config, &once).unwrap();
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn comm_state_ignores_previous(config in single_rate_config(), a in previous_state(), b in previous_state()) {
        // Everything the mapper manages comes from the configuration alone.
        let left = dcb::map_config(&config, &a).unwrap();
        let right = dcb::map_config(&config, &b).unwrap();
        prop_assert_eq!(left.to_configuration(), right.to_configuration());
        prop_assert_eq!(left.rts_control, right.rts_control);
        prop_assert_eq!(left.dtr_control, right.dtr_control);
        prop_assert_eq!((left.xon_char, left.xoff_char), (right.xon_char, right.xoff_char));
    }

    #[test]
    fn comm_state_rejects_split_rates(config in single_rate_config(), input in baud_rate()) {
        prop_assume!(input.as_u32() != config.baud_rate.as_u32());
        let err = dcb::map_config(&config.with_input_baud_rate(input), &CommState::default())
            .unwrap_err();
        prop_assert!(matches!(err, PortError::InputBaudRateUnsupported));
    }
}

#[cfg(unix)]
mod termios_properties {
    use super::*;
    use serialpoll::port::posix::{speed, termios};

    fn blank() -> termios::RegisterImage {
        // SAFETY: termios structs are plain old data; all-zero is valid.
        unsafe { std::mem::zeroed() }
    }

    /// Configurations every unix family can represent.
    fn portable(config: &PortConfiguration) -> bool {
        speed::STICK_PARITY.is_some() || !config.parity.is_stick()
    }

    proptest! {
        #[test]
        fn raw_mode_holds(config in single_rate_config()) {
            prop_assume!(portable(&config));
            let image = termios::map_config(&config, &blank()).unwrap();

            prop_assert_eq!(image.c_oflag, 0);
            prop_assert_eq!(image.c_lflag, 0);
            prop_assert_ne!(image.c_cflag & libc::CREAD, 0);
            prop_assert_eq!(image.c_cc[libc::VMIN], 0);
            prop_assert_eq!(image.c_cc[libc::VTIME], 0);
            prop_assert_eq!(
                image.c_cflag & libc::CLOCAL != 0,
                config.flow_control == FlowControl::None
            );
            prop_assert_eq!(
                image.c_iflag & (libc::IXON | libc::IXOFF) != 0,
                config.flow_control == FlowControl::Software
            );
            prop_assert_eq!(
                image.c_cflag & speed::HARDWARE_FLOW != 0,
                config.flow_control == FlowControl::Hardware
            );
        }

        #[test]
        fn termios_is_idempotent(config in single_rate_config()) {
            prop_assume!(portable(&config));
            let once = termios::map_config(&config, &blank()).unwrap();
            let twice = termios::map_config(&config, &once).unwrap();
            prop_assert_eq!(
                termios::RegisterSnapshot::from(&once),
                termios::RegisterSnapshot::from(&twice)
            );
        }

        #[test]
        fn parity_enables_input_check(config in single_rate_config()) {
            prop_assume!(portable(&config));
            let image = termios::map_config(&config, &blank()).unwrap();
            let checked = config.parity != Parity::None;

            prop_assert_eq!(image.c_cflag & libc::PARENB != 0, checked);
            prop_assert_eq!(image.c_iflag & libc::INPCK != 0, checked);
        }
    }

    #[cfg(target_os = "linux")]
    proptest! {
        #[test]
        fn linux_rates_read_back(output in baud_rate(), input in baud_rate()) {
            let config = PortConfiguration::new(output).with_input_baud_rate(input);
            let image = termios::map_config(&config, &blank()).unwrap();
            prop_assert_eq!(termios::decode_baud(&image), (output, input));
        }
    }

    #[cfg(not(target_os = "linux"))]
    proptest! {
        #[test]
        fn stick_parity_rejected(config in single_rate_config()) {
            prop_assume!(config.parity.is_stick());
            let err = termios::map_config(&config, &blank()).unwrap_err();
            prop_assert!(matches!(err, PortError::ParityMarkSpaceUnsupported));
        }
    }
}
