use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

use super::{Seat, SeatId, TripId};

/// A scheduled run of a bus together with its seat map.
///
/// Seats are created once from a [`BusLayout`] and afterwards only mutated in
/// place: status changes through booking operations, label changes through
/// renames. `version` backs optimistic concurrency in the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    pub id: TripId,
    pub route: String,
    pub departure_date: NaiveDate,
    pub license_plate: String,
    pub seats: Vec<Seat>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    pub fn new(
        route: impl Into<String>,
        departure_date: NaiveDate,
        license_plate: impl Into<String>,
        seats: Vec<Seat>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TripId::new(),
            route: route.into(),
            departure_date,
            license_plate: license_plate.into(),
            seats,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn seat(&self, seat_id: &SeatId) -> Option<&Seat> {
        self.seats.iter().find(|s| &s.id == seat_id)
    }

    pub fn seat_mut(&mut self, seat_id: &SeatId) -> Option<&mut Seat> {
        self.seats.iter_mut().find(|s| &s.id == seat_id)
    }

    pub fn has_seat(&self, seat_id: &SeatId) -> bool {
        self.seat(seat_id).is_some()
    }
}

/// Grid position left empty (stairs, toilet, driver cabin).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridGap {
    pub row: u16,
    pub col: u16,
}

/// Seat plan of a single deck.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FloorPlan {
    #[serde(default)]
    pub rows: u16,
    #[serde(default)]
    pub cols: u16,
    #[serde(default)]
    pub gaps: Vec<GridGap>,
    /// Number of positions on each bench, in bench order.
    #[serde(default)]
    pub benches: Vec<u16>,
    #[serde(default)]
    pub floor_slots: u16,
}

/// Floor numbers are a single byte inside seat ids.
pub const MAX_FLOORS: usize = u8::MAX as usize;
pub const MAX_SEATS_PER_TRIP: usize = 1_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LayoutError {
    #[error("layout produces no seats")]
    Empty,
    #[error("layout has {0} floors, at most {MAX_FLOORS} allowed")]
    TooManyFloors(usize),
    #[error("layout produces more than {MAX_SEATS_PER_TRIP} seats")]
    TooManySeats,
    #[error("layout produces seat {0} twice")]
    DuplicateSeat(SeatId),
}

impl FloorPlan {
    /// Seats this deck expands to, or `None` past `limit`.
    fn seat_count(&self, limit: usize) -> Option<usize> {
        let gaps: HashSet<(u16, u16)> = self
            .gaps
            .iter()
            .filter(|g| (1..=self.rows).contains(&g.row) && (1..=self.cols).contains(&g.col))
            .map(|g| (g.row, g.col))
            .collect();
        let grid = usize::from(self.rows) * usize::from(self.cols) - gaps.len();
        let total = self
            .benches
            .iter()
            .fold(grid, |acc, size| acc.saturating_add(usize::from(*size)))
            .saturating_add(usize::from(self.floor_slots));
        (total <= limit).then_some(total)
    }
}

/// Bus layout template a trip's seat map is stamped from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusLayout {
    pub floors: Vec<FloorPlan>,
}

impl BusLayout {
    /// Expands the template into seats, all `available`.
    ///
    /// Labels run per deck: `A01, A02, ...` on the first floor, `B01, ...` on the
    /// second. Ids come from the physical position, so two trips stamped from the
    /// same template share seat ids.
    ///
    /// The template is sized before anything is allocated and rejected when it
    /// exceeds [`MAX_FLOORS`] or [`MAX_SEATS_PER_TRIP`].
    pub fn build_seats(&self) -> Result<Vec<Seat>, LayoutError> {
        if self.floors.len() > MAX_FLOORS {
            return Err(LayoutError::TooManyFloors(self.floors.len()));
        }
        let mut expected = 0usize;
        for plan in &self.floors {
            expected += plan
                .seat_count(MAX_SEATS_PER_TRIP - expected)
                .ok_or(LayoutError::TooManySeats)?;
        }
        if expected == 0 {
            return Err(LayoutError::Empty);
        }

        let mut seats = Vec::with_capacity(expected);
        for (idx, plan) in self.floors.iter().enumerate() {
            let floor = u8::try_from(idx + 1).map_err(|_| LayoutError::TooManyFloors(self.floors.len()))?;
            let prefix = char::from(b'A' + (floor - 1).min(25));
            let mut counter = 0u32;
            let mut label = || {
                counter += 1;
                format!("{prefix}{counter:02}")
            };

            for row in 1..=plan.rows {
                for col in 1..=plan.cols {
                    if plan.gaps.iter().any(|g| g.row == row && g.col == col) {
                        continue;
                    }
                    seats.push(Seat::new(SeatId::grid(floor, row, col), label()));
                }
            }

            for (bench_idx, size) in plan.benches.iter().enumerate() {
                let bench = u16::try_from(bench_idx + 1).unwrap_or(u16::MAX);
                for index in 1..=*size {
                    seats.push(Seat::new(SeatId::bench(floor, bench, index), label()));
                }
            }

            for index in 1..=plan.floor_slots {
                seats.push(Seat::new(SeatId::floor_slot(floor, 1, index), label()));
            }
        }

        let mut seen = HashSet::with_capacity(seats.len());
        if let Some(dup) = seats.iter().find(|s| !seen.insert(s.id)) {
            return Err(LayoutError::DuplicateSeat(dup.id));
        }
        Ok(seats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SeatStatus;

    #[test]
    fn layout_skips_gaps_and_labels_per_floor() {
        let layout = BusLayout {
            floors: vec![
                FloorPlan {
                    rows: 2,
                    cols: 2,
                    gaps: vec![GridGap { row: 1, col: 2 }],
                    benches: vec![3],
                    floor_slots: 0,
                },
                FloorPlan {
                    rows: 1,
                    cols: 1,
                    gaps: vec![],
                    benches: vec![],
                    floor_slots: 2,
                },
            ],
        };

        let seats = layout.build_seats().unwrap();
        let ids: Vec<String> = seats.iter().map(|s| s.id.to_string()).collect();
        assert_eq!(
            ids,
            vec!["F1-R1-C1", "F1-R2-C1", "F1-R2-C2", "F1-B1-1", "F1-B1-2", "F1-B1-3", "F2-R1-C1", "F2-S1-1", "F2-S1-2"]
        );
        assert_eq!(seats[0].label, "A01");
        assert_eq!(seats[5].label, "A06");
        assert_eq!(seats[6].label, "B01");
        assert!(seats.iter().all(|s| s.status == SeatStatus::Available));
    }

    fn single_seat_floor() -> FloorPlan {
        FloorPlan {
            rows: 1,
            cols: 1,
            gaps: vec![],
            benches: vec![],
            floor_slots: 0,
        }
    }

    #[test]
    fn floors_beyond_the_id_range_are_rejected() {
        let layout = BusLayout {
            floors: vec![single_seat_floor(); MAX_FLOORS + 2],
        };
        assert_eq!(layout.build_seats(), Err(LayoutError::TooManyFloors(MAX_FLOORS + 2)));

        let widest = BusLayout {
            floors: vec![single_seat_floor(); MAX_FLOORS],
        };
        let seats = widest.build_seats().unwrap();
        let distinct: HashSet<SeatId> = seats.iter().map(|s| s.id).collect();
        assert_eq!(distinct.len(), MAX_FLOORS);
    }

    #[test]
    fn oversized_grid_is_rejected_before_allocation() {
        let layout = BusLayout {
            floors: vec![FloorPlan {
                rows: u16::MAX,
                cols: u16::MAX,
                ..single_seat_floor()
            }],
        };
        assert_eq!(layout.build_seats(), Err(LayoutError::TooManySeats));
    }

    #[test]
    fn all_gaps_leaves_an_empty_layout() {
        let layout = BusLayout {
            floors: vec![FloorPlan {
                gaps: vec![GridGap { row: 1, col: 1 }, GridGap { row: 1, col: 1 }],
                ..single_seat_floor()
            }],
        };
        assert_eq!(layout.build_seats(), Err(LayoutError::Empty));
    }
}
