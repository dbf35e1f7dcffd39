//! Reward batch types
//!
//! A reward batch groups the transactions of one merchant, point-of-sale type
//! and calendar month (optionally split by batch kind) for evaluation.

use std::fmt;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::counters::BatchCounters;

/// Reward batch identifier
pub type BatchId = String;

/// Merchant identifier
pub type MerchantId = String;

const MONTH_NAMES: [&str; 12] = [
    "gennaio",
    "febbraio",
    "marzo",
    "aprile",
    "maggio",
    "giugno",
    "luglio",
    "agosto",
    "settembre",
    "ottobre",
    "novembre",
    "dicembre",
];

/// Point-of-sale type of the merchant terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PosType {
    Physical,
    Online,
}

impl PosType {
    /// Label used in batch display names
    pub fn label(&self) -> &'static str {
        match self {
            PosType::Physical => "Fisico",
            PosType::Online => "Online",
        }
    }
}

impl fmt::Display for PosType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PosType::Physical => write!(f, "PHYSICAL"),
            PosType::Online => write!(f, "ONLINE"),
        }
    }
}

/// Whether the batch collects regular or rejected transactions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchKind {
    Regular,
    Rejected,
}

impl fmt::Display for BatchKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchKind::Regular => write!(f, "REGULAR"),
            BatchKind::Rejected => write!(f, "REJECTED"),
        }
    }
}

/// Reward batch status
///
/// `CREATED -> SENT -> APPROVED`, with `CREATED -> APPROVED` allowed on
/// confirmation. `APPROVED` is final.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BatchStatus {
    Created,
    Sent,
    Approved,
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BatchStatus::Created => write!(f, "CREATED"),
            BatchStatus::Sent => write!(f, "SENT"),
            BatchStatus::Approved => write!(f, "APPROVED"),
        }
    }
}

/// Calendar month of a batch, rendered as `YYYY-MM`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BatchMonth(NaiveDate);

impl BatchMonth {
    /// Month containing the given date
    pub fn of(date: NaiveDate) -> Self {
        BatchMonth(date.with_day(1).unwrap_or(date))
    }

    /// Parse a `YYYY-MM` string
    pub fn parse(value: &str) -> Option<Self> {
        let (year, month) = value.split_once('-')?;
        if year.len() != 4 || month.len() != 2 {
            return None;
        }
        let year: i32 = year.parse().ok()?;
        let month: u32 = month.parse().ok()?;
        NaiveDate::from_ymd_opt(year, month, 1).map(BatchMonth)
    }

    /// The following calendar month
    pub fn next(&self) -> Option<Self> {
        self.0.checked_add_months(Months::new(1)).map(BatchMonth)
    }

    pub fn year(&self) -> i32 {
        self.0.year()
    }

    pub fn month(&self) -> u32 {
        self.0.month()
    }

    /// First instant of the month
    pub fn start(&self) -> NaiveDateTime {
        self.0.and_time(chrono::NaiveTime::MIN)
    }

    /// Last millisecond of the month
    pub fn end(&self) -> NaiveDateTime {
        match self.next() {
            Some(next) => next.start() - Duration::milliseconds(1),
            None => NaiveDateTime::MAX,
        }
    }

    /// Localized month name, e.g. `gennaio 2025`
    pub fn display_name(&self) -> String {
        format!("{} {}", MONTH_NAMES[self.0.month0() as usize], self.0.year())
    }
}

impl fmt::Display for BatchMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.0.year(), self.0.month())
    }
}

impl TryFrom<String> for BatchMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        BatchMonth::parse(&value).ok_or_else(|| format!("invalid month '{}'", value))
    }
}

impl From<BatchMonth> for String {
    fn from(month: BatchMonth) -> Self {
        month.to_string()
    }
}

/// Unique key of a reward batch
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BatchKey {
    pub merchant_id: MerchantId,
    pub pos_type: PosType,
    pub month: BatchMonth,
    pub kind: BatchKind,
}

impl BatchKey {
    pub fn new(merchant_id: &str, pos_type: PosType, month: BatchMonth, kind: BatchKind) -> Self {
        BatchKey {
            merchant_id: merchant_id.to_string(),
            pos_type,
            month,
            kind,
        }
    }

    /// Same merchant, point-of-sale type and kind for the following month
    pub fn successor(&self) -> Option<Self> {
        Some(BatchKey {
            month: self.month.next()?,
            ..self.clone()
        })
    }

    /// Identifier derived from the key
    ///
    /// Two writers creating the same batch build the same identifier.
    pub fn batch_id(&self) -> BatchId {
        Uuid::new_v5(&Uuid::NAMESPACE_OID, self.to_string().as_bytes()).to_string()
    }
}

impl fmt::Display for BatchKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.merchant_id, self.pos_type, self.month, self.kind
        )
    }
}

/// Reward batch document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardBatch {
    pub id: BatchId,
    pub merchant_id: MerchantId,
    pub month: BatchMonth,
    pub pos_type: PosType,
    pub batch_kind: BatchKind,
    pub status: BatchStatus,
    /// True until the batch is confirmed
    pub partial: bool,
    pub name: String,
    pub start_date: NaiveDateTime,
    pub end_date: NaiveDateTime,
    #[serde(flatten)]
    pub counters: BatchCounters,
    pub creation_date: DateTime<Utc>,
    pub update_date: DateTime<Utc>,
}

impl RewardBatch {
    /// Build a new, empty batch in `CREATED` status for the given key
    pub fn new(key: &BatchKey, now: DateTime<Utc>) -> Self {
        RewardBatch {
            id: key.batch_id(),
            merchant_id: key.merchant_id.clone(),
            month: key.month,
            pos_type: key.pos_type,
            batch_kind: key.kind,
            status: BatchStatus::Created,
            partial: true,
            name: batch_name(key),
            start_date: key.month.start(),
            end_date: key.month.end(),
            counters: BatchCounters::default(),
            creation_date: now,
            update_date: now,
        }
    }

    pub fn key(&self) -> BatchKey {
        BatchKey {
            merchant_id: self.merchant_id.clone(),
            pos_type: self.pos_type,
            month: self.month,
            kind: self.batch_kind,
        }
    }

    /// Move the batch to `status`, closing it when it becomes approved
    pub fn transition(&mut self, status: BatchStatus, now: DateTime<Utc>) {
        self.status = status;
        self.partial = status != BatchStatus::Approved;
        self.update_date = now;
    }
}

fn batch_name(key: &BatchKey) -> String {
    let name = format!("{} - {}", key.month.display_name(), key.pos_type.label());
    match key.kind {
        BatchKind::Regular => name,
        BatchKind::Rejected => format!("{} - rigettati", name),
    }
}
