//! Enumeration from `HKLM\HARDWARE\DEVICEMAP\SERIALCOMM`.
//!
//! Each value maps a driver object name (`\Device\Serial0`) to the DOS name
//! the port is opened by (`COM1`).

use super::{PortStub, MAX_NAME_LEN, MAX_PATH_LEN};
use crate::port::error::PortError;
use std::ffi::OsStr;
use std::io;
use std::os::windows::ffi::OsStrExt;
use std::ptr;
use tracing::debug;
use winapi::shared::minwindef::{DWORD, HKEY};
use winapi::shared::winerror::{
    ERROR_FILE_NOT_FOUND, ERROR_MORE_DATA, ERROR_NO_MORE_ITEMS, ERROR_SUCCESS,
};
use winapi::um::winnt::{KEY_READ, REG_SZ};
use winapi::um::winreg::{RegCloseKey, RegEnumValueW, RegOpenKeyExW, HKEY_LOCAL_MACHINE};

const SERIALCOMM: &str = r"HARDWARE\DEVICEMAP\SERIALCOMM";

/// Prefix that lets `CreateFileW` open ports numbered above 9.
const DEVICE_NAMESPACE: &str = r"\\.\";

pub(super) struct RegistryIter {
    key: HKEY,
    index: DWORD,
    /// Set once enumeration fails; the key is not read again.
    failed: bool,
}

impl RegistryIter {
    /// `Ok(None)` when the key is absent (no serial drivers loaded).
    pub(super) fn open() -> Result<Option<Self>, PortError> {
        let subkey: Vec<u16> = OsStr::new(SERIALCOMM).encode_wide().chain(Some(0)).collect();
        let mut key: HKEY = ptr::null_mut();
        // SAFETY: `subkey` is NUL-terminated; `key` receives the opened handle.
        let rc = unsafe { RegOpenKeyExW(HKEY_LOCAL_MACHINE, subkey.as_ptr(), 0, KEY_READ, &mut key) };
        match rc as DWORD {
            ERROR_SUCCESS => Ok(Some(Self {
                key,
                index: 0,
                failed: false,
            })),
            ERROR_FILE_NOT_FOUND => {
                debug!("No SERIALCOMM device map present");
                Ok(None)
            }
            code => Err(io::Error::from_raw_os_error(code as i32).into()),
        }
    }
}

impl Iterator for RegistryIter {
    type Item = Result<PortStub, PortError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let mut value_name = [0u16; MAX_NAME_LEN + 1];
        let mut data = [0u16; MAX_NAME_LEN + 1];

        loop {
            let mut name_len = value_name.len() as DWORD;
            let mut data_len = (data.len() * 2) as DWORD;
            let mut kind: DWORD = 0;
            // SAFETY: buffer lengths are passed alongside their pointers.
            let rc = unsafe {
                RegEnumValueW(
                    self.key,
                    self.index,
                    value_name.as_mut_ptr(),
                    &mut name_len,
                    ptr::null_mut(),
                    &mut kind,
                    data.as_mut_ptr().cast(),
                    &mut data_len,
                )
            };
            self.index += 1;

            match rc as DWORD {
                ERROR_SUCCESS => {}
                ERROR_NO_MORE_ITEMS => return None,
                ERROR_MORE_DATA => {
                    debug!("Skipping over-long SERIALCOMM entry {}", self.index - 1);
                    continue;
                }
                code => {
                    self.failed = true;
                    return Some(Err(io::Error::from_raw_os_error(code as i32).into()));
                }
            }
            if kind != REG_SZ {
                continue;
            }

            let units = &data[..data_len as usize / 2];
            let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
            let name = String::from_utf16_lossy(&units[..end]);
            if name.is_empty() || name.len() > MAX_NAME_LEN {
                continue;
            }
            let path = format!("{DEVICE_NAMESPACE}{name}");
            if path.len() > MAX_PATH_LEN {
                continue;
            }
            return Some(Ok(PortStub::new(name, path)));
        }
    }
}

impl Drop for RegistryIter {
    fn drop(&mut self) {
        // SAFETY: we own the key.
        unsafe { RegCloseKey(self.key) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enumeration_error_ends_iteration() {
        // Enumerating through a null key fails with ERROR_INVALID_HANDLE.
        let mut iter = RegistryIter {
            key: ptr::null_mut(),
            index: 0,
            failed: false,
        };

        assert!(matches!(iter.next(), Some(Err(_))));
        assert!(iter.next().is_none());
        assert!(iter.next().is_none());
    }
}
