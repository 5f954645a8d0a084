use std::sync::LazyLock;
use types::{Hhmm, Turno, Weekday};

pub const BLOCK_MINUTES: i32 = 45;
pub const MINUTES_PER_DAY: i32 = 24 * 60;

pub const DAY_START: Hhmm = Hhmm::new(7, 0);
pub const DAY_END: Hhmm = Hhmm::new(20, 30);

pub fn to_minutes(hour: i32, minute: i32) -> i32 {
    hour * 60 + minute
}

pub fn minutes_of(t: Hhmm) -> i32 {
    to_minutes(t.hour() as i32, t.minute() as i32)
}

/// Packs minutes-since-midnight back into `HHMM`, wrapping around the day.
pub fn to_hhmm(minutes: i32) -> Hhmm {
    let m = minutes.rem_euclid(MINUTES_PER_DAY);
    Hhmm::new((m / 60) as u16, (m % 60) as u16)
}

pub fn add_blocks(t: Hhmm, blocks: i32) -> Hhmm {
    to_hhmm(minutes_of(t) + blocks * BLOCK_MINUTES)
}

/// Number of blocks needed to cover `[start, end)`, rounded up. `None` for
/// empty or inverted spans.
pub fn blocks_between(start: Hhmm, end: Hhmm) -> Option<u32> {
    let span = minutes_of(end) - minutes_of(start);
    if span <= 0 {
        return None;
    }
    Some(((span + BLOCK_MINUTES - 1) / BLOCK_MINUTES) as u32)
}

pub fn format_display(t: Hhmm) -> String {
    let (h, m) = (t.hour(), t.minute());
    let suffix = if h < 12 { "AM" } else { "PM" };
    let h12 = match h % 12 {
        0 => 12,
        x => x,
    };
    format!("{h12}:{m:02} {suffix}")
}

pub fn parse_time(raw: &str) -> Option<Hhmm> {
    raw.parse().ok()
}

pub fn weekday(name: &str) -> Option<Weekday> {
    let day = match name.trim().to_lowercase().as_str() {
        "lunes" => Weekday::Lunes,
        "martes" => Weekday::Martes,
        "miercoles" | "miércoles" => Weekday::Miercoles,
        "jueves" => Weekday::Jueves,
        "viernes" => Weekday::Viernes,
        "sabado" | "sábado" => Weekday::Sabado,
        _ => return None,
    };
    Some(day)
}

/// `lunes` = 0 .. `sabado` = 5. Anything else is not a day and must be skipped.
pub fn day_index(name: &str) -> Option<usize> {
    weekday(name).map(Weekday::index)
}

pub fn turno_window(turno: Turno) -> (Hhmm, Hhmm) {
    match turno {
        Turno::Manana => (DAY_START, Hhmm::new(13, 0)),
        Turno::Tarde => (Hhmm::new(13, 0), Hhmm::new(18, 15)),
        Turno::Noche => (Hhmm::new(18, 15), DAY_END),
    }
}

/// Ordered block starts that make up the columns of every grid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockTable {
    starts: Vec<Hhmm>,
}

pub static STANDARD_BLOCKS: LazyLock<BlockTable> =
    LazyLock::new(|| BlockTable::spanning(DAY_START, DAY_END));

impl BlockTable {
    /// Every block that starts at or after `first` and ends by `end`.
    pub fn spanning(first: Hhmm, end: Hhmm) -> Self {
        let end_min = minutes_of(end);
        let mut starts = Vec::new();
        let mut m = minutes_of(first);
        while m + BLOCK_MINUTES <= end_min {
            starts.push(to_hhmm(m));
            m += BLOCK_MINUTES;
        }
        Self { starts }
    }

    pub fn from_starts(mut starts: Vec<Hhmm>) -> Self {
        starts.sort_unstable();
        starts.dedup();
        Self { starts }
    }

    pub fn standard() -> Self {
        STANDARD_BLOCKS.clone()
    }

    pub fn narrow(&self, turno: Turno) -> Self {
        let (from, to) = turno_window(turno);
        Self {
            starts: self.fitting(from, to),
        }
    }

    pub fn starts(&self) -> &[Hhmm] {
        &self.starts
    }

    pub fn len(&self) -> usize {
        self.starts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.starts.is_empty()
    }

    pub fn contains(&self, t: Hhmm) -> bool {
        self.starts.binary_search(&t).is_ok()
    }

    pub fn position(&self, t: Hhmm) -> Option<usize> {
        self.starts.binary_search(&t).ok()
    }

    /// Blocks that start at or after `from` and finish no later than `to`.
    pub fn fitting(&self, from: Hhmm, to: Hhmm) -> Vec<Hhmm> {
        let (lo, hi) = (minutes_of(from), minutes_of(to));
        self.starts
            .iter()
            .copied()
            .filter(|&b| {
                let s = minutes_of(b);
                s >= lo && s + BLOCK_MINUTES <= hi
            })
            .collect()
    }
}
