//! NTP time tags.

/// Seconds between the NTP epoch (1900-01-01) and the Unix epoch (1970-01-01).
pub const NTP_UNIX_OFFSET: u64 = 2_208_988_800;

const FRACTION_SCALE: f64 = 4_294_967_296.0; // 2^32

/// 64-bit NTP time tag: 32-bit seconds since 1900, 32-bit binary fraction.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NtpTime {
    pub seconds: u32,
    pub fraction: u32,
}

impl NtpTime {
    /// The special tag `0x0000000000000001`: execute immediately.
    pub const IMMEDIATE: NtpTime = NtpTime {
        seconds: 0,
        fraction: 1,
    };

    #[inline]
    pub const fn new(seconds: u32, fraction: u32) -> Self {
        Self { seconds, fraction }
    }

    #[inline]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            seconds: (bits >> 32) as u32,
            fraction: bits as u32,
        }
    }

    #[inline]
    pub const fn to_bits(self) -> u64 {
        ((self.seconds as u64) << 32) | self.fraction as u64
    }

    #[inline]
    pub const fn is_immediate(self) -> bool {
        self.to_bits() == Self::IMMEDIATE.to_bits()
    }

    /// Build a tag from a Unix timestamp. Times before 1970 are not representable.
    pub fn from_unix(secs: u64, nanos: u32) -> Self {
        let seconds = secs.wrapping_add(NTP_UNIX_OFFSET) as u32;
        let fraction = ((u64::from(nanos) << 32) / 1_000_000_000) as u32;
        Self { seconds, fraction }
    }

    /// Fractional part expressed in nanoseconds.
    #[inline]
    pub fn fraction_nanos(self) -> u32 {
        ((u64::from(self.fraction) * 1_000_000_000) >> 32) as u32
    }

    /// Signed difference `self - earlier` in seconds.
    ///
    /// Computed in 32.32 fixed point so sub-microsecond precision survives the large
    /// seconds-since-1900 magnitude.
    #[inline]
    pub fn secs_since(self, earlier: NtpTime) -> f64 {
        let diff = i128::from(self.to_bits()) - i128::from(earlier.to_bits());
        diff as f64 / FRACTION_SCALE
    }

    /// Shift the tag by a (possibly negative) number of seconds.
    pub fn offset_by(self, secs: f64) -> NtpTime {
        let delta = (secs * FRACTION_SCALE) as i64;
        NtpTime::from_bits(self.to_bits().wrapping_add_signed(delta))
    }

    #[cfg(feature = "std")]
    pub fn from_system_time(time: std::time::SystemTime) -> Self {
        match time.duration_since(std::time::UNIX_EPOCH) {
            Ok(since) => Self::from_unix(since.as_secs(), since.subsec_nanos()),
            Err(_) => Self::from_unix(0, 0),
        }
    }

    /// Current wall-clock time.
    #[cfg(feature = "std")]
    pub fn now() -> Self {
        Self::from_system_time(std::time::SystemTime::now())
    }
}

impl From<u64> for NtpTime {
    fn from(bits: u64) -> Self {
        Self::from_bits(bits)
    }
}

impl From<NtpTime> for u64 {
    fn from(tag: NtpTime) -> Self {
        tag.to_bits()
    }
}
