//! Sensor input: the change signal raised from interrupt context, the source
//! the loop reads snapshots from, and a scripted source for simulation and
//! tests.

use chess_core::{Bitboard, Square};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("sensor read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid square '{0}' in sensor script")]
    InvalidScript(String),
}

/// "Something under the board changed."
///
/// The only state shared with interrupt context. The interrupt handler calls
/// [`raise`](Self::raise); the loop calls [`take`](Self::take) once per pass
/// and reads the sensors only when it returns true.
#[derive(Debug, Default)]
pub struct SensorSignal(AtomicBool);

impl SensorSignal {
    pub const fn new() -> Self {
        SensorSignal(AtomicBool::new(false))
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Clears the signal, returning whether it was raised.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Anything that can report the current occupancy of all 64 squares.
pub trait SensorSource {
    fn read(&mut self) -> Result<Bitboard, SensorError>;
}

/// A sensor driven by a toggle script.
///
/// Script format: squares are two characters (`e2`), whitespace separates
/// squares, and `.` ends a batch. Each batch toggles its squares together and
/// counts as one sensor reading.
///
/// ```
/// use chess_core::Bitboard;
/// use move_reconciler::ScriptedSensor;
///
/// let mut sensor = ScriptedSensor::new(Bitboard::EMPTY);
/// sensor.push_script("e2. e4.").unwrap();
/// assert_eq!(sensor.pending(), 2);
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptedSensor {
    bitboard: Bitboard,
    batches: VecDeque<Vec<Square>>,
}

impl ScriptedSensor {
    pub fn new(initial: Bitboard) -> Self {
        ScriptedSensor {
            bitboard: initial,
            batches: VecDeque::new(),
        }
    }

    /// Queues the batches of `script`. Nothing is queued on error.
    pub fn push_script(&mut self, script: &str) -> Result<(), SensorError> {
        let mut batches = vec![Vec::new()];
        let mut token = String::new();

        for ch in script.chars() {
            match ch {
                '.' => {
                    flush_token(&mut token, &mut batches)?;
                    batches.push(Vec::new());
                }
                c if c.is_whitespace() => flush_token(&mut token, &mut batches)?,
                c => {
                    token.push(c);
                    if token.len() == 2 {
                        flush_token(&mut token, &mut batches)?;
                    }
                }
            }
        }
        flush_token(&mut token, &mut batches)?;

        self.batches
            .extend(batches.into_iter().filter(|batch| !batch.is_empty()));
        Ok(())
    }

    pub fn toggle(&mut self, sq: Square) {
        self.bitboard = self.bitboard ^ Bitboard::from_square(sq);
    }

    /// Replaces the whole reading, e.g. after the pieces were set up by hand.
    pub fn load(&mut self, bitboard: Bitboard) {
        self.bitboard = bitboard;
    }

    pub fn bitboard(&self) -> Bitboard {
        self.bitboard
    }

    /// Number of batches not yet applied.
    pub fn pending(&self) -> usize {
        self.batches.len()
    }

    /// Applies the next batch and returns the resulting reading.
    pub fn step(&mut self) -> Option<Bitboard> {
        let batch = self.batches.pop_front()?;
        for sq in batch {
            self.toggle(sq);
        }
        Some(self.bitboard)
    }

    /// Applies every queued batch, handing each reading to `f`.
    pub fn drain(&mut self, mut f: impl FnMut(Bitboard)) {
        while let Some(bitboard) = self.step() {
            f(bitboard);
        }
    }
}

impl SensorSource for ScriptedSensor {
    fn read(&mut self) -> Result<Bitboard, SensorError> {
        Ok(self.bitboard)
    }
}

fn flush_token(token: &mut String, batches: &mut [Vec<Square>]) -> Result<(), SensorError> {
    if token.is_empty() {
        return Ok(());
    }
    let sq = Square::from_algebraic(token.as_str())
        .ok_or_else(|| SensorError::InvalidScript(token.clone()))?;
    if let Some(batch) = batches.last_mut() {
        batch.push(sq);
    }
    token.clear();
    Ok(())
}
