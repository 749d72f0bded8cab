//! spidev transport
//!
//! Every [`BusTransport`] call becomes one `SPI_IOC_MESSAGE` with a single
//! transfer, so chip select stays asserted for exactly one call. Calls
//! longer than the kernel's spidev buffer are split into several messages.

use crate::error::{LinuxSpiError, Result, Setting};

use wilcspi_core::transport::BusTransport;

use std::fs::{File, OpenOptions};
use std::os::unix::io::AsRawFd;

/// Path to kernel spidev buffer size parameter
const BUF_SIZE_SYSFS: &str = "/sys/module/spidev/parameters/bufsiz";

/// Default SPI clock speed in Hz (WILC chips run up to 48 MHz)
const DEFAULT_SPEED_HZ: u32 = 8_000_000;

/// SPI mode constants
pub mod mode {
    /// SPI mode 0: CPOL=0, CPHA=0 (what WILC chips expect)
    pub const MODE_0: u8 = 0;
    /// SPI mode 3: CPOL=1, CPHA=1
    pub const MODE_3: u8 = 3;
}

/// Linux spidev ioctl constants
mod ioctl {
    use nix::ioctl_write_ptr;

    const SPI_IOC_MAGIC: u8 = b'k';

    const SPI_IOC_TYPE_MODE: u8 = 1;
    const SPI_IOC_TYPE_BITS_PER_WORD: u8 = 3;
    const SPI_IOC_TYPE_MAX_SPEED_HZ: u8 = 4;

    ioctl_write_ptr!(spi_ioc_wr_mode, SPI_IOC_MAGIC, SPI_IOC_TYPE_MODE, u8);
    ioctl_write_ptr!(
        spi_ioc_wr_bits_per_word,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_BITS_PER_WORD,
        u8
    );
    ioctl_write_ptr!(
        spi_ioc_wr_max_speed_hz,
        SPI_IOC_MAGIC,
        SPI_IOC_TYPE_MAX_SPEED_HZ,
        u32
    );

    /// Size of struct spi_ioc_transfer
    pub const SPI_IOC_TRANSFER_SIZE: usize = 32;

    /// SPI_IOC_MESSAGE(n) = _IOW(SPI_IOC_MAGIC, 0, char[n * sizeof(spi_ioc_transfer)])
    pub fn spi_ioc_message(n: u8) -> libc::c_ulong {
        let size = (n as usize) * SPI_IOC_TRANSFER_SIZE;
        ((1u32 << 30) | ((size as u32) << 16) | ((SPI_IOC_MAGIC as u32) << 8)) as libc::c_ulong
    }
}

/// Kernel struct spi_ioc_transfer
#[repr(C)]
#[derive(Debug, Default, Clone)]
struct SpiIocTransfer {
    tx_buf: u64,
    rx_buf: u64,
    len: u32,
    speed_hz: u32,
    delay_usecs: u16,
    bits_per_word: u8,
    cs_change: u8,
    tx_nbits: u8,
    rx_nbits: u8,
    word_delay_usecs: u8,
    _pad: u8,
}

/// Configuration for opening a spidev device
#[derive(Debug, Clone)]
pub struct LinuxSpiConfig {
    /// Device path (e.g., "/dev/spidev0.0")
    pub device: String,
    /// SPI clock speed in Hz
    pub speed_hz: u32,
    /// SPI mode (0-3)
    pub mode: u8,
}

impl Default for LinuxSpiConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            speed_hz: DEFAULT_SPEED_HZ,
            mode: mode::MODE_0,
        }
    }
}

impl LinuxSpiConfig {
    /// Create a new configuration with the given device path
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..Default::default()
        }
    }

    /// Set the SPI clock speed in Hz
    pub fn with_speed(mut self, speed_hz: u32) -> Self {
        self.speed_hz = speed_hz;
        self
    }

    /// Set the SPI mode (0-3)
    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }
}

/// WILC bus transport over `/dev/spidevX.Y`
pub struct LinuxSpi {
    file: File,
    max_kernel_buf_size: usize,
    speed_hz: u32,
}

impl LinuxSpi {
    /// Open and configure a spidev device
    pub fn open(config: &LinuxSpiConfig) -> Result<Self> {
        if config.device.is_empty() {
            return Err(LinuxSpiError::NoDevice);
        }

        log::debug!("linux_spi: Opening device {}", config.device);

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&config.device)
            .map_err(|e| LinuxSpiError::OpenFailed {
                path: config.device.clone(),
                source: e,
            })?;

        let fd = file.as_raw_fd();
        let failed = |setting, value, e: nix::errno::Errno| LinuxSpiError::ConfigureFailed {
            setting,
            value,
            source: std::io::Error::from_raw_os_error(e as i32),
        };

        let mode = config.mode;
        unsafe {
            ioctl::spi_ioc_wr_mode(fd, &mode)
                .map_err(|e| failed(Setting::Mode, u32::from(mode), e))?;
        }

        let bits: u8 = 8;
        unsafe {
            ioctl::spi_ioc_wr_bits_per_word(fd, &bits)
                .map_err(|e| failed(Setting::BitsPerWord, u32::from(bits), e))?;
        }

        let speed = config.speed_hz;
        unsafe {
            ioctl::spi_ioc_wr_max_speed_hz(fd, &speed)
                .map_err(|e| failed(Setting::SpeedHz, speed, e))?;
        }

        let max_kernel_buf_size = get_max_kernel_buf_size();
        log::info!(
            "linux_spi: Opened {} (mode={}, speed={} kHz, bufsiz={})",
            config.device,
            mode,
            speed / 1000,
            max_kernel_buf_size
        );

        Ok(Self {
            file,
            max_kernel_buf_size,
            speed_hz: speed,
        })
    }

    /// Open a device with default settings
    pub fn open_device(device: &str) -> Result<Self> {
        Self::open(&LinuxSpiConfig::new(device))
    }

    /// Current clock speed in Hz
    pub fn speed_hz(&self) -> u32 {
        self.speed_hz
    }

    /// Clock `len` bytes, sending from `tx` (zeros when absent) and storing
    /// into `rx` when present
    fn spi_transfer(
        &mut self,
        tx: Option<&[u8]>,
        mut rx: Option<&mut [u8]>,
        len: usize,
    ) -> Result<()> {
        let fd = self.file.as_raw_fd();
        let step = self.max_kernel_buf_size.max(1);

        if len > step {
            log::debug!(
                "linux_spi: splitting {} byte transfer into {} byte messages",
                len,
                step
            );
        }

        let mut offset = 0;
        while offset < len {
            let part = (len - offset).min(step);
            let transfer = SpiIocTransfer {
                tx_buf: tx.map_or(0, |b| b[offset..].as_ptr() as u64),
                rx_buf: rx
                    .as_deref_mut()
                    .map_or(0, |b| b[offset..].as_mut_ptr() as u64),
                len: part as u32,
                speed_hz: self.speed_hz,
                bits_per_word: 8,
                ..Default::default()
            };

            let ret = unsafe {
                libc::ioctl(
                    fd,
                    ioctl::spi_ioc_message(1),
                    &transfer as *const SpiIocTransfer,
                )
            };
            if ret < 0 {
                return Err(LinuxSpiError::TransferFailed {
                    len,
                    source: std::io::Error::last_os_error(),
                });
            }
            offset += part;
        }

        Ok(())
    }
}

fn report(result: Result<()>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            log::error!("linux_spi: {}", e);
            false
        }
    }
}

impl BusTransport for LinuxSpi {
    fn transmit(&mut self, data: &[u8]) -> bool {
        let len = data.len();
        report(self.spi_transfer(Some(data), None, len))
    }

    fn receive(&mut self, buf: &mut [u8]) -> bool {
        let len = buf.len();
        report(self.spi_transfer(None, Some(buf), len))
    }

    fn transact(&mut self, tx: &[u8], rx: &mut [u8]) -> bool {
        if tx.len() != rx.len() {
            return report(Err(LinuxSpiError::LengthMismatch {
                tx: tx.len(),
                rx: rx.len(),
            }));
        }
        let len = tx.len();
        report(self.spi_transfer(Some(tx), Some(rx), len))
    }
}

/// Read the maximum kernel buffer size from sysfs, or use page size as fallback
fn get_max_kernel_buf_size() -> usize {
    if let Ok(content) = std::fs::read_to_string(BUF_SIZE_SYSFS) {
        if let Ok(size) = content.trim().parse::<usize>() {
            if size > 0 {
                return size;
            }
        }
        log::warn!("linux_spi: Invalid buffer size in {}", BUF_SIZE_SYSFS);
    } else {
        log::debug!("linux_spi: Cannot read {}, using page size", BUF_SIZE_SYSFS);
    }

    let page_size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
    if page_size > 0 {
        page_size as usize
    } else {
        4096
    }
}

/// Parse programmer options from a list of key-value pairs
///
/// - `dev=/dev/spidevX.Y` - required device path
/// - `spispeed=<kHz>` - clock speed
/// - `mode=0..3` - SPI mode
pub fn parse_options(options: &[(&str, &str)]) -> Result<LinuxSpiConfig> {
    let mut config = LinuxSpiConfig::default();

    for (key, value) in options {
        match *key {
            "dev" => {
                config.device = value.to_string();
            }
            "spispeed" => {
                let speed_khz: u32 = value.parse().map_err(|_| {
                    LinuxSpiError::InvalidParameter(format!("Invalid spispeed value: {}", value))
                })?;
                config.speed_hz = speed_khz.checked_mul(1000).ok_or_else(|| {
                    LinuxSpiError::InvalidParameter(format!("spispeed too large: {}", value))
                })?;
            }
            "mode" => {
                let mode: u8 = value.parse().map_err(|_| {
                    LinuxSpiError::InvalidParameter(format!("Invalid mode value: {}", value))
                })?;
                if mode > mode::MODE_3 {
                    return Err(LinuxSpiError::InvalidParameter(format!(
                        "Invalid SPI mode: {} (must be 0-3)",
                        mode
                    )));
                }
                config.mode = mode;
            }
            _ => {
                log::warn!("linux_spi: Unknown option: {}={}", key, value);
            }
        }
    }

    if config.device.is_empty() {
        return Err(LinuxSpiError::NoDevice);
    }

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options() {
        let config =
            parse_options(&[("dev", "/dev/spidev1.0"), ("spispeed", "24000"), ("mode", "3")])
                .unwrap();
        assert_eq!(config.device, "/dev/spidev1.0");
        assert_eq!(config.speed_hz, 24_000_000);
        assert_eq!(config.mode, 3);

        let config = parse_options(&[("dev", "/dev/spidev0.0")]).unwrap();
        assert_eq!(config.speed_hz, DEFAULT_SPEED_HZ);
        assert_eq!(config.mode, mode::MODE_0);
    }

    #[test]
    fn test_parse_options_errors() {
        assert!(matches!(parse_options(&[]), Err(LinuxSpiError::NoDevice)));
        assert!(matches!(
            parse_options(&[("dev", "/dev/spidev0.0"), ("mode", "4")]),
            Err(LinuxSpiError::InvalidParameter(_))
        ));
        assert!(matches!(
            parse_options(&[("dev", "/dev/spidev0.0"), ("spispeed", "fast")]),
            Err(LinuxSpiError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_spi_ioc_message() {
        // _IOW('k', 0, char[32])
        assert_eq!(ioctl::spi_ioc_message(1), 0x4020_6B00);
    }

    #[test]
    fn test_transfer_struct_layout() {
        assert_eq!(
            std::mem::size_of::<SpiIocTransfer>(),
            ioctl::SPI_IOC_TRANSFER_SIZE
        );
    }
}
