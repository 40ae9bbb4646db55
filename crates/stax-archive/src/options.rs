//! Archive option flags.

/// Options controlling how an archive is opened and how batch operations
/// behave.
///
/// On the wire (and in foreign interfaces) these are a bitmask; see
/// [`ArchiveOptions::bits`] and [`ArchiveOptions::from_bits`].
///
/// # Example
///
/// ```
/// use stax_archive::ArchiveOptions;
///
/// let options = ArchiveOptions::default().ignore_errors(true).write_crc(false);
/// assert_eq!(options.bits(), ArchiveOptions::IGNORE_ERRORS);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ArchiveOptions {
    /// Log every processed entry at `info` level instead of `debug`.
    pub verbose: bool,
    /// Store bare file names instead of paths relative to the added root.
    pub only_names: bool,
    /// Skip failing entries in batch operations instead of aborting.
    pub ignore_errors: bool,
    /// Store a CRC32 for every entry of a newly created archive.
    pub write_crc: bool,
    /// Skip signature magic and CRC32 validation.
    pub disable_checks: bool,
}

impl ArchiveOptions {
    pub const VERBOSE: u8 = 0x01;
    pub const ONLY_NAMES: u8 = 0x02;
    pub const IGNORE_ERRORS: u8 = 0x04;
    pub const WRITE_CRC: u8 = 0x08;
    pub const DISABLE_CHECKS: u8 = 0x10;

    /// Decode options from a bitmask. Unknown bits are ignored.
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            verbose: bits & Self::VERBOSE != 0,
            only_names: bits & Self::ONLY_NAMES != 0,
            ignore_errors: bits & Self::IGNORE_ERRORS != 0,
            write_crc: bits & Self::WRITE_CRC != 0,
            disable_checks: bits & Self::DISABLE_CHECKS != 0,
        }
    }

    /// Encode options as a bitmask.
    pub const fn bits(&self) -> u8 {
        let mut bits = 0;
        if self.verbose {
            bits |= Self::VERBOSE;
        }
        if self.only_names {
            bits |= Self::ONLY_NAMES;
        }
        if self.ignore_errors {
            bits |= Self::IGNORE_ERRORS;
        }
        if self.write_crc {
            bits |= Self::WRITE_CRC;
        }
        if self.disable_checks {
            bits |= Self::DISABLE_CHECKS;
        }
        bits
    }

    pub fn verbose(mut self, value: bool) -> Self {
        self.verbose = value;
        self
    }

    pub fn only_names(mut self, value: bool) -> Self {
        self.only_names = value;
        self
    }

    pub fn ignore_errors(mut self, value: bool) -> Self {
        self.ignore_errors = value;
        self
    }

    pub fn write_crc(mut self, value: bool) -> Self {
        self.write_crc = value;
        self
    }

    pub fn disable_checks(mut self, value: bool) -> Self {
        self.disable_checks = value;
        self
    }
}

impl Default for ArchiveOptions {
    fn default() -> Self {
        Self {
            verbose: false,
            only_names: false,
            ignore_errors: false,
            write_crc: true,
            disable_checks: false,
        }
    }
}
