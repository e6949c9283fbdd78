//! Media Value Types
//!
//! States and quantities mirrored from the remote player.

/// Media timestamp in microseconds.
///
/// Seeks compare targets in this representation, so two requests for the
/// "same" second value always compare equal after conversion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MediaTime(i64);

impl MediaTime {
    pub const ZERO: Self = Self(0);
    /// Unbounded duration (live streams)
    pub const INFINITE: Self = Self(i64::MAX);

    const MICROS_PER_SECOND: f64 = 1_000_000.0;

    pub fn from_micros(micros: i64) -> Self {
        Self(micros)
    }

    /// Convert from seconds. NaN maps to zero, out-of-range values saturate.
    pub fn from_seconds(seconds: f64) -> Self {
        Self((seconds * Self::MICROS_PER_SECOND).round() as i64)
    }

    pub fn as_micros(&self) -> i64 {
        self.0
    }

    pub fn as_seconds(&self) -> f64 {
        match self.0 {
            i64::MAX => f64::INFINITY,
            i64::MIN => f64::NEG_INFINITY,
            micros => micros as f64 / Self::MICROS_PER_SECOND,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

/// Network state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NetworkState {
    #[default]
    Empty = 0,
    Idle = 1,
    Loading = 2,
    Loaded = 3,
    FormatError = 4,
    NetworkError = 5,
    DecodeError = 6,
}

impl NetworkState {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(Self::Empty),
            1 => Some(Self::Idle),
            2 => Some(Self::Loading),
            3 => Some(Self::Loaded),
            4 => Some(Self::FormatError),
            5 => Some(Self::NetworkError),
            6 => Some(Self::DecodeError),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(
            self,
            Self::FormatError | Self::NetworkError | Self::DecodeError
        )
    }
}

/// Ready state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum ReadyState {
    #[default]
    HaveNothing = 0,
    HaveMetadata = 1,
    HaveCurrentData = 2,
    HaveFutureData = 3,
    HaveEnoughData = 4,
}

impl ReadyState {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(Self::HaveNothing),
            1 => Some(Self::HaveMetadata),
            2 => Some(Self::HaveCurrentData),
            3 => Some(Self::HaveFutureData),
            4 => Some(Self::HaveEnoughData),
            _ => None,
        }
    }
}

/// Track presence bits reported with `MediaDataChanged`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MediaTypeMask(pub i32);

impl MediaTypeMask {
    pub const NEITHER: Self = Self(0);
    pub const VIDEO: Self = Self(0x1);
    pub const AUDIO: Self = Self(0x2);
    pub const TEXT: Self = Self(0x4);

    pub fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn has_video(&self) -> bool {
        self.contains(Self::VIDEO)
    }

    pub fn has_audio(&self) -> bool {
        self.contains(Self::AUDIO)
    }
}

impl std::ops::BitOr for MediaTypeMask {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

/// Kind of remote player requested by `Init`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PlayerKind {
    /// No load has happened yet
    #[default]
    None = 0,
    Url = 1,
    /// URL playback rendered by the remote side into a punched-through hole
    UrlWithVideoHole = 2,
    MediaSource = 3,
}

impl PlayerKind {
    pub fn from_u8(val: u8) -> Option<Self> {
        match val {
            0 => Some(Self::None),
            1 => Some(Self::Url),
            2 => Some(Self::UrlWithVideoHole),
            3 => Some(Self::MediaSource),
            _ => None,
        }
    }
}

/// Source the client asks the player to load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadType {
    Url,
    MediaSource,
    MediaStream,
}

/// Whether `load` sent `Init` right away
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTiming {
    Immediate,
    Deferred,
}

/// Content classification reported to the playback delegate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaContentType {
    /// Long or unbounded content
    Persistent,
    /// Short clip (notification sounds and the like)
    OneShot,
}

impl MediaContentType {
    /// Unknown (zero) durations count as persistent
    pub fn from_duration(duration: MediaTime, one_shot_max: MediaTime) -> Self {
        if duration.is_zero() || duration > one_shot_max {
            Self::Persistent
        } else {
            Self::OneShot
        }
    }
}

/// Time ranges
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimeRanges {
    ranges: Vec<(f64, f64)>,
}

impl TimeRanges {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(start: f64, end: f64) -> Self {
        Self {
            ranges: vec![(start, end)],
        }
    }

    pub fn add(&mut self, start: f64, end: f64) {
        self.ranges.push((start, end));
    }

    pub fn length(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn start(&self, index: usize) -> Option<f64> {
        self.ranges.get(index).map(|(s, _)| *s)
    }

    pub fn end(&self, index: usize) -> Option<f64> {
        self.ranges.get(index).map(|(_, e)| *e)
    }
}
