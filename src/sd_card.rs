//! SD card over SPI: bring-up with retries and the `Storage` adapter the
//! capture pipeline writes through.

use core::fmt::Write as _;

use defmt::*;
use embassy_rp::gpio::Output;
use embassy_rp::spi;
use embassy_time::{block_for, Duration, Instant};
use embedded_hal::delay::DelayNs;
use embedded_hal_bus::spi::ExclusiveDevice;
use embedded_sdmmc::{Mode, RawDirectory, RawFile, SdCard, TimeSource, Timestamp, VolumeIdx, VolumeManager};
use static_cell::StaticCell;

use serial_sd_logger::config::*;
use serial_sd_logger::{Entry, Storage};

pub type SdSpi = spi::Spi<'static, embassy_rp::peripherals::SPI1, spi::Blocking>;
pub type SdCs = Output<'static>;
pub type SdSpiDev = ExclusiveDevice<SdSpi, SdCs, CortexMDelay>;
pub type SdVolumeManager = VolumeManager<SdCard<SdSpiDev, CortexMDelay>, UptimeTimeSource>;

/// Owns the card for the rest of the program lifetime
static VOLUME_MGR: StaticCell<SdVolumeManager> = StaticCell::new();

/// FAT timestamps from uptime (no RTC on board): day 0 is 2025-01-01 and the
/// day rolls within a 28-day month so every field stays valid.
pub struct UptimeTimeSource;

impl TimeSource for UptimeTimeSource {
    fn get_timestamp(&self) -> Timestamp {
        let secs = Instant::now().as_secs();
        let days = secs / 86_400;
        let rem = secs % 86_400;
        Timestamp {
            year_since_1970: 55,
            zero_indexed_month: ((days / 28) % 12) as u8,
            zero_indexed_day: (days % 28) as u8,
            hours: (rem / 3600) as u8,
            minutes: ((rem % 3600) / 60) as u8,
            seconds: (rem % 60) as u8,
        }
    }
}

/// Minimal delay implementation using busy-wait (cortex-m)
pub struct CortexMDelay;

impl DelayNs for CortexMDelay {
    fn delay_ns(&mut self, ns: u32) {
        // At 150 MHz (RP2350), ~6.67 ns per cycle
        let cycles = ns / 7 + 1;
        cortex_m::asm::delay(cycles);
    }
}

#[derive(Debug, Format)]
pub enum MountError {
    SpiDevice,
    CardInit,
    Volume(embedded_sdmmc::Error<embedded_sdmmc::SdCardError>),
}

/// Bring up the card at the slow SPI clock, retrying `SD_INIT_RETRIES`
/// times, then switch to the working clock and open the first volume's root.
pub fn mount(spi: SdSpi, cs: SdCs) -> Result<SdStorage, MountError> {
    let spi_device = ExclusiveDevice::new(spi, cs, CortexMDelay).map_err(|_| MountError::SpiDevice)?;
    let sd_card = SdCard::new(spi_device, CortexMDelay);

    let mut init_ok = false;
    for attempt in 1..=SD_INIT_RETRIES {
        info!("SD init attempt {}/{}...", attempt, SD_INIT_RETRIES);
        match sd_card.num_bytes() {
            Ok(bytes) => {
                info!("SD card: {} MB", bytes / (1024 * 1024));
                init_ok = true;
                break;
            }
            Err(e) => {
                warn!("SD init failed: {:?}", e);
                block_for(Duration::from_millis(500));
                sd_card.mark_card_uninit();
            }
        }
    }
    if !init_ok {
        error!("SD card init failed after {} attempts", SD_INIT_RETRIES);
        return Err(MountError::CardInit);
    }

    sd_card.spi(|dev| {
        dev.bus_mut().set_frequency(SD_SPI_WORK_FREQ);
    });
    info!("SPI switched to {} Hz", SD_SPI_WORK_FREQ);

    let volume_mgr: &'static SdVolumeManager = VOLUME_MGR.init(VolumeManager::new(sd_card, UptimeTimeSource));
    let raw_volume = volume_mgr.open_raw_volume(VolumeIdx(0)).map_err(MountError::Volume)?;
    let root = volume_mgr.open_root_dir(raw_volume).map_err(MountError::Volume)?;
    info!("Filesystem mounted");

    Ok(SdStorage { volume_mgr, root })
}

#[derive(Debug, Format)]
pub enum SdStorageError {
    Device(embedded_sdmmc::Error<embedded_sdmmc::SdCardError>),
    /// Only `<dir>` and `<dir>/<file>` are supported
    PathTooDeep,
}

impl From<embedded_sdmmc::Error<embedded_sdmmc::SdCardError>> for SdStorageError {
    fn from(e: embedded_sdmmc::Error<embedded_sdmmc::SdCardError>) -> Self {
        Self::Device(e)
    }
}

/// `Storage` over the FAT volume. Names are 8.3 short names, so session
/// directories top out at `DIR99999` and segments at `FILE_999.txt`; longer
/// names fail with a filename error.
pub struct SdStorage {
    volume_mgr: &'static SdVolumeManager,
    root: RawDirectory,
}

impl SdStorage {
    fn split(path: &str) -> Result<(Option<&str>, &str), SdStorageError> {
        match path.split_once('/') {
            None => Ok((None, path)),
            Some((dir, name)) if !name.contains('/') => Ok((Some(dir), name)),
            Some(_) => Err(SdStorageError::PathTooDeep),
        }
    }

    fn with_dir<R>(
        &self,
        dir: Option<&str>,
        f: impl FnOnce(RawDirectory) -> Result<R, SdStorageError>,
    ) -> Result<R, SdStorageError> {
        let Some(dir) = dir.filter(|d| !d.is_empty()) else {
            return f(self.root);
        };
        let handle = self.volume_mgr.open_dir(self.root, dir)?;
        let result = f(handle);
        let closed = self.volume_mgr.close_dir(handle);
        let value = result?;
        closed?;
        Ok(value)
    }
}

impl Storage for SdStorage {
    type Error = SdStorageError;
    type File = RawFile;

    fn list<F>(&mut self, dir: &str, mut visit: F) -> Result<(), Self::Error>
    where
        F: FnMut(Entry<'_>),
    {
        let target = if dir.is_empty() { None } else { Some(dir) };
        self.with_dir(target, |handle| {
            self.volume_mgr.iterate_dir(handle, |entry| {
                if entry.attributes.is_volume() {
                    return;
                }
                let mut name: heapless::String<12> = heapless::String::new();
                if write!(name, "{}", entry.name).is_err() || name == "." || name == ".." {
                    return;
                }
                visit(Entry {
                    name: name.as_str(),
                    is_dir: entry.attributes.is_directory(),
                });
            })?;
            Ok(())
        })
    }

    fn mkdir(&mut self, path: &str) -> Result<(), Self::Error> {
        let (dir, name) = Self::split(path)?;
        self.with_dir(dir, |handle| Ok(self.volume_mgr.make_dir_in_dir(handle, name)?))
    }

    fn open_append(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        let (dir, name) = Self::split(path)?;
        self.with_dir(dir, |handle| {
            Ok(self
                .volume_mgr
                .open_file_in_dir(handle, name, Mode::ReadWriteCreateOrAppend)?)
        })
    }

    /// The byte count is the growth of the file, so a write that fails half
    /// way is not reported as complete.
    fn write(&mut self, file: &mut Self::File, data: &[u8]) -> Result<usize, Self::Error> {
        let before = self.volume_mgr.file_length(*file)?;
        self.volume_mgr.write(*file, data)?;
        let after = self.volume_mgr.file_length(*file)?;
        Ok(after.saturating_sub(before) as usize)
    }

    fn close(&mut self, file: Self::File) -> Result<(), Self::Error> {
        Ok(self.volume_mgr.close_file(file)?)
    }
}
