//! Windows serial port handle.
//!
//! The device is opened for overlapped I/O so that waiting for a received
//! byte never blocks the caller. Reads and writes are overlapped too but are
//! reaped before returning; with `CommTimeouts::NON_BLOCKING` in effect a read
//! finishes as soon as the driver has copied out whatever is queued, and a
//! write stalled by flow control is cut short. A transfer the driver still
//! holds after `TRANSFER_WAIT_MS` is cancelled and reaped.

use super::dcb::{self, CommState, CommTimeouts};
use super::error::PortError;
use super::traits::{ControlLines, FlushSelection, PortConfiguration, SerialPortAdapter};
use super::wait::{EventSource, WaitStart, WaitState};
use std::ffi::OsStr;
use std::io::{self, Read, Write};
use std::mem;
use std::os::windows::ffi::OsStrExt;
use std::ptr;
use tracing::{debug, warn};
use winapi::shared::minwindef::{DWORD, FALSE, TRUE};
use winapi::shared::winerror::{
    ERROR_IO_INCOMPLETE, ERROR_IO_PENDING, ERROR_OPERATION_ABORTED, ERROR_SEM_TIMEOUT, WAIT_TIMEOUT,
};
use winapi::um::commapi::{
    ClearCommError, EscapeCommFunction, GetCommState, GetCommTimeouts, PurgeComm, SetCommMask,
    SetCommState, SetCommTimeouts, WaitCommEvent,
};
use winapi::um::fileapi::{CreateFileW, ReadFile, WriteFile, OPEN_EXISTING};
use winapi::um::handleapi::{CloseHandle, INVALID_HANDLE_VALUE};
use winapi::um::ioapiset::{CancelIoEx, GetOverlappedResult};
use winapi::um::minwinbase::OVERLAPPED;
use winapi::um::synchapi::{CreateEventW, WaitForSingleObject};
use winapi::um::winbase::{
    CLRDTR, CLRRTS, COMMTIMEOUTS, COMSTAT, DCB, EV_RXCHAR, FILE_FLAG_OVERLAPPED, PURGE_RXABORT,
    PURGE_RXCLEAR, PURGE_TXABORT, PURGE_TXCLEAR, SETDTR, SETRTS,
};
use winapi::um::winnt::{GENERIC_READ, GENERIC_WRITE, HANDLE};

/// Longest a read or write may hold the caller before it is cancelled.
const TRANSFER_WAIT_MS: DWORD = 2 * dcb::WRITE_TIMEOUT_MS;

/// Manual-reset event owned for the lifetime of one overlapped operation.
struct Event(HANDLE);

impl Event {
    fn new() -> io::Result<Self> {
        // SAFETY: unnamed event with default security.
        let handle = unsafe { CreateEventW(ptr::null_mut(), TRUE, FALSE, ptr::null()) };
        if handle.is_null() {
            return Err(io::Error::last_os_error());
        }
        Ok(Event(handle))
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        // SAFETY: we own the handle.
        unsafe { CloseHandle(self.0) };
    }
}

/// Completion context of an outstanding `WaitCommEvent`.
///
/// Boxed so the kernel keeps writing to a stable address until the wait is
/// reaped.
struct PendingWait {
    overlapped: OVERLAPPED,
    mask: DWORD,
    _event: Event,
}

impl PendingWait {
    fn new() -> io::Result<Box<Self>> {
        let event = Event::new()?;
        // SAFETY: OVERLAPPED is plain data; all-zero is its documented initial state.
        let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };
        overlapped.hEvent = event.0;
        Ok(Box::new(PendingWait {
            overlapped,
            mask: 0,
            _event: event,
        }))
    }
}

/// `EventSource` over a comm handle.
struct CommEvents {
    handle: HANDLE,
}

impl EventSource for CommEvents {
    type Pending = Box<PendingWait>;

    fn queued_bytes(&mut self) -> io::Result<usize> {
        queued_bytes(self.handle)
    }

    fn start_wait(&mut self) -> io::Result<WaitStart<Box<PendingWait>>> {
        // SAFETY: valid handle owned by the port.
        if unsafe { SetCommMask(self.handle, EV_RXCHAR) } == 0 {
            return Err(io::Error::last_os_error());
        }

        let mut pending = PendingWait::new()?;
        let ctx = &mut *pending;
        // SAFETY: `ctx` lives in a box that outlives the operation.
        if unsafe { WaitCommEvent(self.handle, &mut ctx.mask, &mut ctx.overlapped) } != 0 {
            return Ok(WaitStart::Completed(pending.mask & EV_RXCHAR != 0));
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(ERROR_IO_PENDING as i32) {
            Ok(WaitStart::Pending(pending))
        } else {
            Err(err)
        }
    }

    fn check_wait(&mut self, pending: &mut Box<PendingWait>) -> io::Result<Option<bool>> {
        let mut transferred: DWORD = 0;
        // SAFETY: the overlapped belongs to the outstanding wait.
        let done = unsafe {
            GetOverlappedResult(self.handle, &mut pending.overlapped, &mut transferred, FALSE)
        };
        if done != 0 {
            return Ok(Some(pending.mask & EV_RXCHAR != 0));
        }

        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(ERROR_IO_INCOMPLETE as i32) {
            Ok(None)
        } else {
            Err(err)
        }
    }

    fn abandon(&mut self, mut pending: Box<PendingWait>) {
        let mut transferred: DWORD = 0;
        // SAFETY: clearing the mask completes the outstanding wait, after which
        // the blocking reap returns and the context may be freed.
        unsafe {
            SetCommMask(self.handle, 0);
            GetOverlappedResult(self.handle, &mut pending.overlapped, &mut transferred, TRUE);
        }
    }
}

fn queued_bytes(handle: HANDLE) -> io::Result<usize> {
    let mut errors: DWORD = 0;
    // SAFETY: COMSTAT is plain data filled in by the call.
    let mut stat: COMSTAT = unsafe { mem::zeroed() };
    if unsafe { ClearCommError(handle, &mut errors, &mut stat) } == 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(stat.cbInQue as usize)
}

fn comm_state(raw: &DCB) -> CommState {
    CommState {
        baud_rate: raw.BaudRate,
        binary: raw.fBinary() != 0,
        parity_check: raw.fParity() != 0,
        outx_cts_flow: raw.fOutxCtsFlow() != 0,
        outx_dsr_flow: raw.fOutxDsrFlow() != 0,
        dtr_control: raw.fDtrControl(),
        dsr_sensitivity: raw.fDsrSensitivity() != 0,
        tx_continue_on_xoff: raw.fTXContinueOnXoff() != 0,
        out_x: raw.fOutX() != 0,
        in_x: raw.fInX() != 0,
        error_char_enabled: raw.fErrorChar() != 0,
        null_discard: raw.fNull() != 0,
        rts_control: raw.fRtsControl(),
        abort_on_error: raw.fAbortOnError() != 0,
        xon_lim: raw.XonLim,
        xoff_lim: raw.XoffLim,
        byte_size: raw.ByteSize,
        parity: raw.Parity,
        stop_bits: raw.StopBits,
        xon_char: raw.XonChar as u8,
        xoff_char: raw.XoffChar as u8,
        error_char: raw.ErrorChar as u8,
        eof_char: raw.EofChar as u8,
        evt_char: raw.EvtChar as u8,
    }
}

fn apply_comm_state(raw: &mut DCB, state: &CommState) {
    raw.BaudRate = state.baud_rate;
    raw.set_fBinary(state.binary as DWORD);
    raw.set_fParity(state.parity_check as DWORD);
    raw.set_fOutxCtsFlow(state.outx_cts_flow as DWORD);
    raw.set_fOutxDsrFlow(state.outx_dsr_flow as DWORD);
    raw.set_fDtrControl(state.dtr_control);
    raw.set_fDsrSensitivity(state.dsr_sensitivity as DWORD);
    raw.set_fTXContinueOnXoff(state.tx_continue_on_xoff as DWORD);
    raw.set_fOutX(state.out_x as DWORD);
    raw.set_fInX(state.in_x as DWORD);
    raw.set_fErrorChar(state.error_char_enabled as DWORD);
    raw.set_fNull(state.null_discard as DWORD);
    raw.set_fRtsControl(state.rts_control);
    raw.set_fAbortOnError(state.abort_on_error as DWORD);
    raw.XonLim = state.xon_lim;
    raw.XoffLim = state.xoff_lim;
    raw.ByteSize = state.byte_size;
    raw.Parity = state.parity;
    raw.StopBits = state.stop_bits;
    raw.XonChar = state.xon_char as i8;
    raw.XoffChar = state.xoff_char as i8;
    raw.ErrorChar = state.error_char as i8;
    raw.EofChar = state.eof_char as i8;
    raw.EvtChar = state.evt_char as i8;
}

fn raw_timeouts(t: &CommTimeouts) -> COMMTIMEOUTS {
    COMMTIMEOUTS {
        ReadIntervalTimeout: t.read_interval,
        ReadTotalTimeoutMultiplier: t.read_total_multiplier,
        ReadTotalTimeoutConstant: t.read_total_constant,
        WriteTotalTimeoutMultiplier: t.write_total_multiplier,
        WriteTotalTimeoutConstant: t.write_total_constant,
    }
}

fn comm_timeouts(raw: &COMMTIMEOUTS) -> CommTimeouts {
    CommTimeouts {
        read_interval: raw.ReadIntervalTimeout,
        read_total_multiplier: raw.ReadTotalTimeoutMultiplier,
        read_total_constant: raw.ReadTotalTimeoutConstant,
        write_total_multiplier: raw.WriteTotalTimeoutMultiplier,
        write_total_constant: raw.WriteTotalTimeoutConstant,
    }
}

/// An open Windows comm device.
pub struct WindowsPort {
    handle: HANDLE,
    name: String,
    /// Comm state and timeouts from before our first `configure`.
    original: Option<(DCB, COMMTIMEOUTS)>,
    wait: WaitState<Box<PendingWait>>,
}

// SAFETY: the handle is exclusively owned and every operation takes `&mut self`.
unsafe impl Send for WindowsPort {}

impl WindowsPort {
    /// Open `path` (e.g. `\\.\COM3`) for exclusive overlapped access.
    pub fn open(path: &str) -> Result<Self, PortError> {
        if path.contains('\0') {
            return Err(PortError::InvalidPath(path.to_string()));
        }
        let wide: Vec<u16> = OsStr::new(path).encode_wide().chain(Some(0)).collect();

        // SAFETY: `wide` is NUL-terminated and outlives the call.
        let handle = unsafe {
            CreateFileW(
                wide.as_ptr(),
                GENERIC_READ | GENERIC_WRITE,
                0,
                ptr::null_mut(),
                OPEN_EXISTING,
                FILE_FLAG_OVERLAPPED,
                ptr::null_mut(),
            )
        };
        if handle == INVALID_HANDLE_VALUE {
            return Err(PortError::from_open_error(path, io::Error::last_os_error()));
        }

        debug!("Opened serial port {}", path);
        Ok(Self {
            handle,
            name: path.to_string(),
            original: None,
            wait: WaitState::Idle,
        })
    }

    /// Whether the pre-configure state has been captured for restore on close.
    pub fn is_configured(&self) -> bool {
        self.original.is_some()
    }

    /// Comm state and timeouts currently in effect on the device.
    pub fn snapshot(&self) -> Result<(CommState, CommTimeouts), PortError> {
        let dcb = self.read_dcb()?;
        let timeouts = self.read_timeouts()?;
        Ok((comm_state(&dcb), comm_timeouts(&timeouts)))
    }

    /// Whether a readiness wait is outstanding.
    pub fn wait_pending(&self) -> bool {
        self.wait.is_pending()
    }

    fn read_dcb(&self) -> Result<DCB, PortError> {
        // SAFETY: DCB is plain data filled in by the call.
        let mut raw: DCB = unsafe { mem::zeroed() };
        raw.DCBlength = mem::size_of::<DCB>() as DWORD;
        if unsafe { GetCommState(self.handle, &mut raw) } == 0 {
            return Err(PortError::last_os_error());
        }
        Ok(raw)
    }

    fn read_timeouts(&self) -> Result<COMMTIMEOUTS, PortError> {
        // SAFETY: COMMTIMEOUTS is plain data filled in by the call.
        let mut raw: COMMTIMEOUTS = unsafe { mem::zeroed() };
        if unsafe { GetCommTimeouts(self.handle, &mut raw) } == 0 {
            return Err(PortError::last_os_error());
        }
        Ok(raw)
    }

    fn write_state(&self, dcb: &DCB, timeouts: &COMMTIMEOUTS) -> Result<(), PortError> {
        let mut dcb = *dcb;
        let mut timeouts = *timeouts;
        // SAFETY: both structures are fully initialised.
        if unsafe { SetCommState(self.handle, &mut dcb) } == 0 {
            return Err(PortError::last_os_error());
        }
        if unsafe { SetCommTimeouts(self.handle, &mut timeouts) } == 0 {
            return Err(PortError::last_os_error());
        }
        Ok(())
    }

    /// Issue one overlapped transfer and wait for it to finish.
    fn transfer<F>(&mut self, start: F) -> Result<usize, PortError>
    where
        F: FnOnce(HANDLE, &mut OVERLAPPED) -> i32,
    {
        let event = Event::new()?;
        // SAFETY: all-zero OVERLAPPED with our event attached.
        let mut overlapped: OVERLAPPED = unsafe { mem::zeroed() };
        overlapped.hEvent = event.0;

        if start(self.handle, &mut overlapped) == 0 {
            let err = io::Error::last_os_error();
            if err.raw_os_error() != Some(ERROR_IO_PENDING as i32) {
                return Err(err.into());
            }
        }

        // SAFETY: the event belongs to `overlapped`; a timed-out transfer is
        // cancelled so the blocking reap below returns promptly.
        if unsafe { WaitForSingleObject(event.0, TRANSFER_WAIT_MS) } == WAIT_TIMEOUT {
            debug!("Cancelling transfer on {} after {} ms", self.name, TRANSFER_WAIT_MS);
            unsafe { CancelIoEx(self.handle, &mut overlapped) };
        }

        let mut transferred: DWORD = 0;
        // SAFETY: the transfer using `overlapped` has completed or been cancelled.
        if unsafe { GetOverlappedResult(self.handle, &mut overlapped, &mut transferred, TRUE) }
            == 0
        {
            let err = io::Error::last_os_error();
            return cut_short(err, transferred as usize);
        }
        Ok(transferred as usize)
    }

    fn escape(&self, function: DWORD) -> Result<(), PortError> {
        // SAFETY: valid handle, documented function code.
        if unsafe { EscapeCommFunction(self.handle, function) } == 0 {
            return Err(PortError::last_os_error());
        }
        Ok(())
    }
}

/// Outcome of a transfer that ended with `err` after moving `transferred` bytes.
///
/// Timeouts and cancellation keep the partial count; with nothing moved the
/// caller sees `WouldBlock`.
fn cut_short(err: io::Error, transferred: usize) -> Result<usize, PortError> {
    match err.raw_os_error().map(|code| code as DWORD) {
        Some(ERROR_SEM_TIMEOUT) | Some(ERROR_OPERATION_ABORTED) if transferred > 0 => {
            Ok(transferred)
        }
        Some(ERROR_SEM_TIMEOUT) | Some(ERROR_OPERATION_ABORTED) => {
            Err(PortError::Io(io::Error::from(io::ErrorKind::WouldBlock)))
        }
        _ => Err(err.into()),
    }
}

impl SerialPortAdapter for WindowsPort {
    fn open(path: &str) -> Result<Self, PortError> {
        WindowsPort::open(path)
    }

    fn configure(&mut self, config: &PortConfiguration) -> Result<(), PortError> {
        let current = self.read_dcb()?;
        let current_timeouts = self.read_timeouts()?;
        // SetCommState may land even when SetCommTimeouts then fails.
        if self.original.is_none() {
            self.original = Some((current, current_timeouts));
        }
        let next = dcb::map_config(config, &comm_state(&current))?;

        let mut raw = current;
        apply_comm_state(&mut raw, &next);
        self.write_state(&raw, &raw_timeouts(&CommTimeouts::NON_BLOCKING))?;
        debug!("Configured {} as {}", self.name, config);
        Ok(())
    }

    fn flush_queues(&mut self, selection: FlushSelection) -> Result<(), PortError> {
        let mut flags = 0;
        if selection.input {
            flags |= PURGE_RXCLEAR | PURGE_RXABORT;
        }
        if selection.output {
            flags |= PURGE_TXCLEAR | PURGE_TXABORT;
        }
        if flags == 0 {
            return Ok(());
        }
        // SAFETY: valid handle, documented flags.
        if unsafe { PurgeComm(self.handle, flags) } == 0 {
            return Err(PortError::last_os_error());
        }
        Ok(())
    }

    fn poll(&mut self) -> Result<bool, PortError> {
        let mut events = CommEvents {
            handle: self.handle,
        };
        Ok(self.wait.poll(&mut events)?)
    }

    fn read_bytes(&mut self, buffer: &mut [u8]) -> Result<usize, PortError> {
        let len = buffer.len().min(DWORD::MAX as usize) as DWORD;
        let ptr = buffer.as_mut_ptr();
        // SAFETY: `buffer` outlives the transfer, which is reaped before returning.
        let n = self.transfer(|handle, overlapped| unsafe {
            ReadFile(handle, ptr.cast(), len, ptr::null_mut(), overlapped)
        })?;
        if n == 0 && len > 0 {
            return Err(PortError::Io(io::Error::from(io::ErrorKind::WouldBlock)));
        }
        Ok(n)
    }

    fn write_bytes(&mut self, data: &[u8]) -> Result<usize, PortError> {
        let len = data.len().min(DWORD::MAX as usize) as DWORD;
        let ptr = data.as_ptr();
        // SAFETY: `data` outlives the transfer, which is reaped before returning.
        let n = self.transfer(|handle, overlapped| unsafe {
            WriteFile(handle, ptr.cast(), len, ptr::null_mut(), overlapped)
        })?;
        if n == 0 && len > 0 {
            return Err(PortError::Io(io::Error::from(io::ErrorKind::WouldBlock)));
        }
        Ok(n)
    }

    fn bytes_to_read(&mut self) -> Result<usize, PortError> {
        Ok(queued_bytes(self.handle)?)
    }

    fn set_control_lines(&mut self, lines: ControlLines) -> Result<(), PortError> {
        if let Some(dtr) = lines.dtr {
            self.escape(if dtr { SETDTR } else { CLRDTR })?;
        }
        if let Some(rts) = lines.rts {
            self.escape(if rts { SETRTS } else { CLRRTS })?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn close(self) {
        debug!("Closing serial port {}", self.name);
        drop(self)
    }
}

impl Drop for WindowsPort {
    fn drop(&mut self) {
        let mut events = CommEvents {
            handle: self.handle,
        };
        self.wait.cancel(&mut events);

        if let Some((dcb, timeouts)) = self.original.take() {
            if let Err(e) = self.write_state(&dcb, &timeouts) {
                warn!("Failed to restore settings on {}: {}", self.name, e);
            }
        }
        // SAFETY: we own the handle and nothing is outstanding on it.
        unsafe { CloseHandle(self.handle) };
    }
}

impl Read for WindowsPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Ok(self.read_bytes(buf)?)
    }
}

impl Write for WindowsPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(self.write_bytes(buf)?)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for WindowsPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WindowsPort")
            .field("name", &self.name)
            .field("configured", &self.is_configured())
            .field("wait", &self.wait)
            .finish()
    }
}
