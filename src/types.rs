//! Money and time primitives shared by the ledger, session and store
use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use std::fmt;

/// A currency amount held in minor units (paise), so there are never more
/// than two decimal places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);
    const MINOR_PER_MAJOR: u64 = 100;

    pub const fn from_minor(minor: u64) -> Self {
        Self(minor)
    }
    pub const fn from_major(major: u64) -> Self {
        Self(major * Self::MINOR_PER_MAJOR)
    }
    pub fn minor_units(&self) -> u64 {
        self.0
    }
    /// Whole major units, rounded down
    pub fn major_units(&self) -> u64 {
        self.0 / Self::MINOR_PER_MAJOR
    }
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
    pub fn checked_add(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_add(rhs.0).map(Amount)
    }
    pub fn checked_sub(self, rhs: Amount) -> Option<Amount> {
        self.0.checked_sub(rhs.0).map(Amount)
    }
    /// Shortest plain rendering: `500`, `12.5`, `0.05`. Statement search
    /// matches against this form.
    pub fn to_plain_string(&self) -> String {
        let major = self.major_units();
        let minor = self.0 % Self::MINOR_PER_MAJOR;

        match minor {
            0 => major.to_string(),
            m if m % 10 == 0 => format!("{}.{}", major, m / 10),
            m => format!("{}.{:02}", major, m),
        }
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{:02}",
            self.major_units(),
            self.0 % Self::MINOR_PER_MAJOR
        )
    }
}

impl<C> minicbor::Encode<C> for Amount {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.u64(self.0)?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Amount {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(Amount(d.u64()?))
    }
}

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone)]
pub struct TimeStamp<T: TimeZone>(DateTime<T>);

impl TimeStamp<Utc> {
    pub fn new() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
    /// ISO-8601 rendering with millisecond precision
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Millis, true)
    }
}

impl Default for TimeStamp<Utc> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: TimeZone> From<DateTime<T>> for TimeStamp<T> {
    fn from(value: DateTime<T>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp<Utc> {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "failed to encode timestamp. timestamp_nanos_opt returned None",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp<Utc> {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let nsecs = d.i64()?;

        Ok(TimeStamp(DateTime::from_timestamp_nanos(nsecs)))
    }
}
