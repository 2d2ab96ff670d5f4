//! Kernel-facing device registration, event writing and teardown.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::mem::size_of;
use std::os::fd::{AsRawFd, RawFd};
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::caps::{DeviceCapabilities, DeviceDefinition};
use crate::error::{InputError, Result};
use crate::event::{EV_ABS, EV_FF, EV_KEY, EV_LED, EV_MSC, EV_REL, EV_REP, InputEventRecord};
use crate::uinput::{
    UI_ABS_SETUP, UI_DEV_CREATE, UI_DEV_DESTROY, UI_DEV_SETUP, UI_SET_EVBIT, UI_SET_FFBIT,
    UI_SET_KEYBIT, UI_SET_LEDBIT, UI_SET_MSCBIT, UI_SET_PHYS, UI_SET_PROPBIT, UI_SET_RELBIT,
    UINPUT_MAX_NAME_SIZE, input_event, input_id, ui_get_sysname, uinput_abs_setup, uinput_setup,
};

const UINPUT_PATH: &str = "/dev/uinput";
const SYS_INPUT_BASE: &str = "/sys/devices/virtual/input";

/// Owns the live kernel resource behind one virtual device.
///
/// Created by [`DeviceHandle::create`], destroyed on [`DeviceHandle::close`]
/// or drop. `close` is idempotent; every operation on a closed handle fails
/// with [`InputError::ClosedDevice`].
#[derive(Debug)]
pub struct DeviceHandle {
    file: Option<File>,
    sysname: String,
    sys_path: PathBuf,
    nodes: Vec<String>,
}

impl DeviceHandle {
    /// Ask the kernel to materialize a device matching the descriptor.
    ///
    /// Performs the full uinput setup sequence and resolves the resulting
    /// device nodes. Fails hard with [`InputError::DeviceCreation`]; nothing
    /// leaks on any error path, including after `UI_DEV_CREATE`.
    pub fn create(def: &DeviceDefinition, caps: &DeviceCapabilities) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NONBLOCK)
            .open(UINPUT_PATH)
            .map_err(|e| InputError::creation(format!("opening {}", UINPUT_PATH), e))?;

        if !caps.keys.is_empty() {
            ioctl_int(&file, UI_SET_EVBIT, EV_KEY as i32, "UI_SET_EVBIT")?;
            for &code in &caps.keys {
                ioctl_int(&file, UI_SET_KEYBIT, code as i32, "UI_SET_KEYBIT")?;
            }
        }
        if caps.autorepeat {
            ioctl_int(&file, UI_SET_EVBIT, EV_REP as i32, "UI_SET_EVBIT")?;
        }
        if !caps.rel_axes.is_empty() {
            ioctl_int(&file, UI_SET_EVBIT, EV_REL as i32, "UI_SET_EVBIT")?;
            for &code in &caps.rel_axes {
                ioctl_int(&file, UI_SET_RELBIT, code as i32, "UI_SET_RELBIT")?;
            }
        }
        if !caps.abs_axes.is_empty() {
            ioctl_int(&file, UI_SET_EVBIT, EV_ABS as i32, "UI_SET_EVBIT")?;
            for axis in &caps.abs_axes {
                let setup = uinput_abs_setup {
                    code: axis.code,
                    absinfo: axis.absinfo(),
                };
                ioctl_ptr(&file, UI_ABS_SETUP, &setup, "UI_ABS_SETUP")?;
            }
        }
        if !caps.ff_effects.is_empty() {
            ioctl_int(&file, UI_SET_EVBIT, EV_FF as i32, "UI_SET_EVBIT")?;
            for &code in &caps.ff_effects {
                ioctl_int(&file, UI_SET_FFBIT, code as i32, "UI_SET_FFBIT")?;
            }
        }
        if !caps.leds.is_empty() {
            ioctl_int(&file, UI_SET_EVBIT, EV_LED as i32, "UI_SET_EVBIT")?;
            for &code in &caps.leds {
                ioctl_int(&file, UI_SET_LEDBIT, code as i32, "UI_SET_LEDBIT")?;
            }
        }
        if !caps.misc.is_empty() {
            ioctl_int(&file, UI_SET_EVBIT, EV_MSC as i32, "UI_SET_EVBIT")?;
            for &code in &caps.misc {
                ioctl_int(&file, UI_SET_MSCBIT, code as i32, "UI_SET_MSCBIT")?;
            }
        }
        for &prop in &caps.props {
            ioctl_int(&file, UI_SET_PROPBIT, prop as i32, "UI_SET_PROPBIT")?;
        }

        if !def.phys.is_empty() {
            let phys = CString::new(def.phys.as_str()).map_err(|_| {
                InputError::creation(
                    "UI_SET_PHYS",
                    std::io::Error::new(std::io::ErrorKind::InvalidInput, "phys contains NUL"),
                )
            })?;
            let rc = unsafe {
                libc::ioctl(file.as_raw_fd(), UI_SET_PHYS as libc::c_ulong, phys.as_ptr())
            };
            if rc < 0 {
                return Err(InputError::creation(
                    "UI_SET_PHYS",
                    std::io::Error::last_os_error(),
                ));
            }
        }

        let mut setup = uinput_setup {
            id: input_id {
                bustype: caps.bus_type as u16,
                vendor: def.vendor_id,
                product: def.product_id,
                version: def.version,
            },
            ff_effects_max: caps.ff_effects_max,
            ..Default::default()
        };
        let name_bytes = def.name.as_bytes();
        let copy_len = name_bytes.len().min(UINPUT_MAX_NAME_SIZE - 1);
        setup.name[..copy_len].copy_from_slice(&name_bytes[..copy_len]);
        ioctl_ptr(&file, UI_DEV_SETUP, &setup, "UI_DEV_SETUP")?;
        ioctl_int(&file, UI_DEV_CREATE, 0, "UI_DEV_CREATE")?;

        // The device exists from here on; don't leak it on a late failure.
        match Self::resolve_nodes(&file) {
            Ok((sysname, sys_path, nodes)) => {
                if nodes.is_empty() {
                    warn!("no device nodes found under {}", sys_path.display());
                }
                info!(
                    "created virtual device `{}` as {} ({})",
                    def.name,
                    sysname,
                    nodes.join(", ")
                );
                Ok(Self {
                    file: Some(file),
                    sysname,
                    sys_path,
                    nodes,
                })
            }
            Err(e) => {
                unsafe {
                    libc::ioctl(file.as_raw_fd(), UI_DEV_DESTROY as libc::c_ulong, 0);
                }
                Err(e)
            }
        }
    }

    fn resolve_nodes(file: &File) -> Result<(String, PathBuf, Vec<String>)> {
        let mut buf = [0u8; 64];
        let rc = unsafe {
            libc::ioctl(
                file.as_raw_fd(),
                ui_get_sysname(buf.len()) as libc::c_ulong,
                buf.as_mut_ptr(),
            )
        };
        if rc < 0 {
            return Err(InputError::creation(
                "UI_GET_SYSNAME",
                std::io::Error::last_os_error(),
            ));
        }
        let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
        let sysname = String::from_utf8_lossy(&buf[..end]).to_string();
        let sys_path = Path::new(SYS_INPUT_BASE).join(&sysname);

        // Children named event* or js* are the /dev/input nodes consumers open.
        let mut nodes = Vec::new();
        let entries = std::fs::read_dir(&sys_path)
            .map_err(|e| InputError::creation("enumerating device nodes", e))?;
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().to_string();
            if name.starts_with("event") || name.starts_with("js") {
                nodes.push(format!("/dev/input/{}", name));
            }
        }
        nodes.sort();
        Ok((sysname, sys_path, nodes))
    }

    /// Write one encoded batch with a single syscall. Fire-and-forget: no
    /// acknowledgment beyond the write itself.
    pub fn write_batch(&self, events: &[InputEventRecord]) -> Result<()> {
        let mut file = self.file.as_ref().ok_or(InputError::ClosedDevice)?;
        if events.is_empty() {
            return Ok(());
        }
        let raw: Vec<input_event> = events
            .iter()
            .map(|e| input_event::new(e.event_type, e.code, e.value))
            .collect();
        let bytes = unsafe {
            std::slice::from_raw_parts(raw.as_ptr() as *const u8, raw.len() * size_of::<input_event>())
        };
        file.write_all(bytes).map_err(InputError::Write)
    }

    /// Device node paths, stable for the handle's lifetime.
    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Sysfs directory of the device.
    pub fn sys_path(&self) -> &Path {
        &self.sys_path
    }

    pub fn sysname(&self) -> &str {
        &self.sysname
    }

    pub fn is_open(&self) -> bool {
        self.file.is_some()
    }

    pub(crate) fn raw_fd(&self) -> Option<RawFd> {
        self.file.as_ref().map(|f| f.as_raw_fd())
    }

    /// Release the kernel resource. Idempotent; the node paths become
    /// invalid and later operations fail with [`InputError::ClosedDevice`].
    pub fn close(&mut self) {
        if let Some(file) = self.file.take() {
            let rc =
                unsafe { libc::ioctl(file.as_raw_fd(), UI_DEV_DESTROY as libc::c_ulong, 0) };
            if rc < 0 {
                debug!(
                    "UI_DEV_DESTROY on {} failed: {}",
                    self.sysname,
                    std::io::Error::last_os_error()
                );
            }
            debug!("destroyed virtual device {}", self.sysname);
        }
    }
}

impl Drop for DeviceHandle {
    fn drop(&mut self) {
        self.close();
    }
}

fn ioctl_int(file: &File, request: u64, value: i32, context: &str) -> Result<()> {
    let rc = unsafe { libc::ioctl(file.as_raw_fd(), request as libc::c_ulong, value) };
    if rc < 0 {
        return Err(InputError::creation(
            context,
            std::io::Error::last_os_error(),
        ));
    }
    Ok(())
}

fn ioctl_ptr<T>(file: &File, request: u64, value: &T, context: &str) -> Result<()> {
    let rc = unsafe {
        libc::ioctl(
            file.as_raw_fd(),
            request as libc::c_ulong,
            value as *const T,
        )
    };
    if rc < 0 {
        return Err(InputError::creation(
            context,
            std::io::Error::last_os_error(),
        ));
    }
    Ok(())
}
