use std::fmt;

/// Where the reconciler is within one half-move attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Phase {
    /// The sensors agree with the rule engine's board.
    #[default]
    Idle,
    /// One of the mover's pieces is off its square.
    PieceLifted,
    /// An opponent piece is off its square too, or is the only one lifted.
    CaptureLifted,
    /// A move is ready and waits for the confirm button.
    CandidatePending,
    /// The king is in the middle of a castling move.
    CastlingWatch,
    /// King and rook both stand on their castled squares.
    CastlingPending,
    /// A pawn reached the last rank and no promotion piece is chosen yet.
    PromotionPending,
    /// Confirm was pressed but the move could not be played yet.
    AwaitingConfirm,
    /// The sensors no longer describe any move from the agreed position.
    Desync,
}

impl Phase {
    /// A move can be confirmed in this phase.
    pub const fn has_candidate(self) -> bool {
        matches!(self, Phase::CandidatePending | Phase::CastlingPending)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::PieceLifted => "piece lifted",
            Phase::CaptureLifted => "capture lifted",
            Phase::CandidatePending => "candidate pending",
            Phase::CastlingWatch => "castling",
            Phase::CastlingPending => "castling pending",
            Phase::PromotionPending => "promotion pending",
            Phase::AwaitingConfirm => "awaiting confirm",
            Phase::Desync => "desync",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_pending_moves_can_be_confirmed() {
        assert!(Phase::CandidatePending.has_candidate());
        assert!(Phase::CastlingPending.has_candidate());
        assert!(!Phase::PromotionPending.has_candidate());
        assert!(!Phase::AwaitingConfirm.has_candidate());
        assert_eq!(Phase::default(), Phase::Idle);
        assert_eq!(Phase::CastlingWatch.to_string(), "castling");
    }
}
