//! Linux i2c-dev bus backend (`/dev/i2c-N`)

use crate::bus::traits::{BusError, I2cBus};
use async_trait::async_trait;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Select the slave address for subsequent read()/write() calls
const I2C_SLAVE: u32 = 0x0703;
/// Adapter timeout, in units of 10 ms
const I2C_TIMEOUT: u32 = 0x0702;

/// I2C adapter exposed through the kernel's i2c-dev interface
pub struct LinuxI2cBus {
    file: Arc<File>,
    path: String,
}

impl LinuxI2cBus {
    /// Open an adapter device node, e.g. `/dev/i2c-1`
    pub fn open(path: &str) -> Result<Self, BusError> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        debug!("Opened I2C adapter {}", path);
        Ok(Self {
            file: Arc::new(file),
            path: path.to_string(),
        })
    }

    /// Run a blocking transfer on the adapter; the kernel adapter timeout
    /// bounds how long it can take
    async fn transfer<T, F>(&self, address: u8, timeout: Duration, op: F) -> Result<T, BusError>
    where
        T: Send + 'static,
        F: FnOnce(&File) -> io::Result<T> + Send + 'static,
    {
        run_blocking(self.file.clone(), move |file| {
            configure(file, address, timeout)?;
            op(file)
        })
        .await
        .map_err(|e| classify(e, address, timeout))
    }
}

/// Run `op` on the blocking pool and wait for it to finish.
///
/// The call is never abandoned early, so a transfer has always left the
/// adapter by the time the caller releases the bus lock.
async fn run_blocking<T, F>(file: Arc<File>, op: F) -> io::Result<T>
where
    T: Send + 'static,
    F: FnOnce(&File) -> io::Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(move || op(file.as_ref()))
        .await
        .map_err(|join_err| io::Error::new(io::ErrorKind::Other, join_err))?
}

fn configure(file: &File, address: u8, timeout: Duration) -> io::Result<()> {
    let fd = file.as_raw_fd();
    let ticks = (timeout.as_millis() / 10).max(1) as libc::c_ulong;

    // SAFETY: fd is a valid open i2c-dev descriptor for the lifetime of `file`,
    // and both requests take an integer argument by value.
    unsafe {
        if libc::ioctl(fd, I2C_TIMEOUT as _, ticks) < 0 {
            return Err(io::Error::last_os_error());
        }
        if libc::ioctl(fd, I2C_SLAVE as _, address as libc::c_ulong) < 0 {
            return Err(io::Error::last_os_error());
        }
    }
    Ok(())
}

fn classify(err: io::Error, address: u8, timeout: Duration) -> BusError {
    match err.raw_os_error() {
        Some(libc::ENXIO) | Some(libc::EREMOTEIO) => BusError::NoDevice(address),
        Some(libc::ETIMEDOUT) => BusError::Timeout(timeout),
        _ => BusError::Io(err),
    }
}

#[async_trait]
impl I2cBus for LinuxI2cBus {
    async fn write(&mut self, address: u8, bytes: &[u8], timeout: Duration) -> Result<(), BusError> {
        let data = bytes.to_vec();
        self.transfer(address, timeout, move |mut file| file.write_all(&data))
            .await
    }

    async fn read(&mut self, address: u8, buf: &mut [u8], timeout: Duration) -> Result<(), BusError> {
        let len = buf.len();
        let data = self
            .transfer(address, timeout, move |mut file| {
                let mut data = vec![0u8; len];
                file.read_exact(&mut data)?;
                Ok(data)
            })
            .await?;
        buf.copy_from_slice(&data);
        Ok(())
    }

    fn name(&self) -> &str {
        &self.path
    }
}
