use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Stable position key of a seat inside a trip layout.
///
/// The key is derived from where the seat physically sits, never from its
/// display label, so renaming a seat cannot orphan the tickets pointing at it.
/// Serialized as a compact string: `F1-R2-C3`, `F1-B2-3` or `F1-S2-3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SeatId {
    /// Regular seat addressed by row and column.
    Grid { floor: u8, row: u16, col: u16 },
    /// Position on a long bench (sleeper buses, back row).
    Bench { floor: u8, bench: u16, index: u16 },
    /// Loose floor slot (extra beds laid in the aisle).
    FloorSlot { floor: u8, slot: u16, index: u16 },
}

impl SeatId {
    pub const fn grid(floor: u8, row: u16, col: u16) -> Self {
        Self::Grid { floor, row, col }
    }

    pub const fn bench(floor: u8, bench: u16, index: u16) -> Self {
        Self::Bench { floor, bench, index }
    }

    pub const fn floor_slot(floor: u8, slot: u16, index: u16) -> Self {
        Self::FloorSlot { floor, slot, index }
    }

    pub const fn floor(&self) -> u8 {
        match *self {
            Self::Grid { floor, .. } | Self::Bench { floor, .. } | Self::FloorSlot { floor, .. } => floor,
        }
    }

    /// Row-like coordinate: grid row, bench number or slot number.
    pub const fn row(&self) -> u16 {
        match *self {
            Self::Grid { row, .. } => row,
            Self::Bench { bench, .. } => bench,
            Self::FloorSlot { slot, .. } => slot,
        }
    }

    /// Column-like coordinate: grid column or index along the bench/slot.
    pub const fn col(&self) -> u16 {
        match *self {
            Self::Grid { col, .. } => col,
            Self::Bench { index, .. } | Self::FloorSlot { index, .. } => index,
        }
    }
}

impl fmt::Display for SeatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Grid { floor, row, col } => write!(f, "F{floor}-R{row}-C{col}"),
            Self::Bench { floor, bench, index } => write!(f, "F{floor}-B{bench}-{index}"),
            Self::FloorSlot { floor, slot, index } => write!(f, "F{floor}-S{slot}-{index}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid seat id `{0}`")]
pub struct ParseSeatIdError(pub String);

impl FromStr for SeatId {
    type Err = ParseSeatIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseSeatIdError(s.to_string());
        let mut parts = s.split('-');
        let (floor, second, third) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), Some(c), None) => (a, b, c),
            _ => return Err(err()),
        };

        let floor: u8 = floor
            .strip_prefix('F')
            .and_then(|v| v.parse().ok())
            .ok_or_else(err)?;

        let mut chars = second.chars();
        let tag = chars.next().ok_or_else(err)?;
        let major: u16 = chars.as_str().parse().map_err(|_| err())?;

        match tag {
            'R' => {
                let col = third
                    .strip_prefix('C')
                    .and_then(|v| v.parse().ok())
                    .ok_or_else(err)?;
                Ok(Self::grid(floor, major, col))
            }
            'B' => Ok(Self::bench(floor, major, third.parse().map_err(|_| err())?)),
            'S' => Ok(Self::floor_slot(floor, major, third.parse().map_err(|_| err())?)),
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for SeatId {
    type Error = ParseSeatIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SeatId> for String {
    fn from(value: SeatId) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatStatus {
    Available,
    Booked,
    Held,
    Sold,
}

impl SeatStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            SeatStatus::Available => "available",
            SeatStatus::Booked => "booked",
            SeatStatus::Held => "held",
            SeatStatus::Sold => "sold",
        }
    }
}

impl fmt::Display for SeatStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Seat {
    pub id: SeatId,
    pub label: String,
    pub status: SeatStatus,
}

impl Seat {
    pub fn new(id: SeatId, label: impl Into<String>) -> Self {
        Self {
            id,
            label: label.into(),
            status: SeatStatus::Available,
        }
    }

    pub const fn floor(&self) -> u8 {
        self.id.floor()
    }

    pub const fn row(&self) -> u16 {
        self.id.row()
    }

    pub const fn col(&self) -> u16 {
        self.id.col()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seat_ids_parse_back_from_their_display_form() {
        for id in [SeatId::grid(1, 2, 3), SeatId::bench(2, 1, 4), SeatId::floor_slot(1, 9, 0)] {
            assert_eq!(id.to_string().parse::<SeatId>(), Ok(id));
        }
    }

    #[test]
    fn malformed_seat_ids_are_rejected() {
        for raw in ["", "A1", "F1-R2", "F1-R2-3", "F1-X2-3", "Fx-R1-C1", "F1-R1-C1-1"] {
            assert!(raw.parse::<SeatId>().is_err(), "{raw} should not parse");
        }
    }

    #[test]
    fn seat_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&SeatId::bench(1, 3, 2)).unwrap();
        assert_eq!(json, "\"F1-B3-2\"");
        let back: SeatId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, SeatId::bench(1, 3, 2));
    }

    #[test]
    fn position_accessors_follow_the_id() {
        let seat = Seat::new(SeatId::grid(2, 5, 1), "B5");
        assert_eq!((seat.floor(), seat.row(), seat.col()), (2, 5, 1));
        assert_eq!(seat.status, SeatStatus::Available);
    }
}
