//! The move reconciliation state machine.
//!
//! Every sensor snapshot is compared twice: against the previous snapshot
//! (the step, used for desync detection and castling abandonment) and
//! against the baseline, the occupancy of the last position both the sensors
//! and the rule engine agreed on. The baseline comparison is what gets
//! classified, so the order in which a hand lifts and places pieces does not
//! matter. The rule engine is only touched when a candidate is confirmed.

use crate::phase::Phase;
use crate::physical::{castling_origin, castling_target, squares, Delta, PhysicalBoard};
use crate::presentation::PresentationRequest;
use chess_core::{Bitboard, CastleSide, Color, Notation, PieceKind, Square};
use chess_engine::{Game, GameError, LegalScan, MoveList, MoveOutcome};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Changed squares allowed outside a castling or en passant window.
const NORMAL_LIMIT: u32 = 2;
const EN_PASSANT_LIMIT: u32 = 3;
const CASTLING_LIMIT: u32 = 4;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResyncError {
    #[error("board does not match the position yet: missing {missing:?}, extra {extra:?}")]
    Mismatch {
        missing: Vec<Square>,
        extra: Vec<Square>,
    },
}

/// What one input did to the reconciler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing new: the same snapshot again, or a change while desynced.
    None,
    /// The attempt moved to this phase without producing a move.
    Progress(Phase),
    /// A move waits for the confirm button.
    Candidate(Notation),
    /// The board shows something that is not an acceptable move.
    Illegal,
    /// The board is back to the agreed position.
    TakeBack,
    Desync,
    /// The confirmed move was played on the rule engine.
    Applied(MoveOutcome),
    /// Confirm with nothing to play: only restarts the clock.
    ClockRearm(Color),
    Rejected(GameError),
    Resynced,
}

/// State of one half-move attempt. Dropped whenever the board is back in
/// agreement with the rule engine.
#[derive(Debug, Clone, Default)]
struct Context {
    /// Legal moves of the side to move when the attempt started.
    legal: MoveList,
    castle_sides: Vec<CastleSide>,
    en_passant: Vec<Notation>,
    /// Last piece whose destinations were highlighted.
    mover: Option<Square>,
    highlighted: bool,
    /// Opponent square seen empty during this attempt.
    victim: Option<Square>,
    /// The mover came down on `victim`.
    landed: bool,
    /// The king stands on this side's castling square; the rook has not
    /// followed yet.
    castling: Option<CastleSide>,
    candidate: Option<Notation>,
    /// Side that pressed confirm while the promotion piece was missing.
    confirm_side: Option<Color>,
}

impl Context {
    fn start(game: &Game) -> Self {
        let legal = game.legal_moves_for(game.side_to_move(), LegalScan::All);
        let castle_sides = legal.iter().filter_map(|mv| mv.castle_side()).collect();
        let en_passant = legal.iter().copied().filter(|mv| mv.is_en_passant()).collect();
        Context {
            legal,
            castle_sides,
            en_passant,
            ..Context::default()
        }
    }
}

/// Square of the pawn an en passant move removes.
fn en_passant_victim(mv: Notation) -> Option<Square> {
    match mv {
        Notation::Piece { from, to, .. } => {
            Square::from_coords(to.file_index() as i8, from.rank_index() as i8)
        }
        Notation::Castle(_) => None,
    }
}

fn en_passant_squares(mv: Notation) -> Bitboard {
    let mut squares = Bitboard::EMPTY;
    for sq in [mv.from(), mv.to(), en_passant_victim(mv)].into_iter().flatten() {
        squares.set(sq);
    }
    squares
}

#[derive(Debug, Clone)]
pub struct Reconciler {
    physical: PhysicalBoard,
    baseline: Bitboard,
    phase: Phase,
    ctx: Context,
    /// Move the remote engine chose; the only one accepted while set.
    expected: Option<Notation>,
    /// Promotion piece picked before the pawn reached the last rank.
    promotion_choice: Option<PieceKind>,
    outbox: Vec<PresentationRequest>,
}

impl Reconciler {
    /// A reconciler whose sensors are assumed to agree with `game`.
    pub fn new(game: &Game) -> Self {
        let physical = PhysicalBoard::new(game.position());
        Reconciler {
            baseline: physical.occupancy(),
            physical,
            phase: Phase::Idle,
            ctx: Context::default(),
            expected: None,
            promotion_choice: None,
            outbox: Vec::new(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn baseline(&self) -> Bitboard {
        self.baseline
    }

    pub fn physical(&self) -> &PhysicalBoard {
        &self.physical
    }

    pub fn candidate(&self) -> Option<Notation> {
        self.ctx.candidate
    }

    pub fn expected_move(&self) -> Option<Notation> {
        self.expected
    }

    pub fn promotion_choice(&self) -> Option<PieceKind> {
        self.promotion_choice
    }

    /// Presentation requests issued since the last call.
    pub fn drain_requests(&mut self) -> Vec<PresentationRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Feeds one sensor snapshot.
    pub fn bitboard_changed(&mut self, game: &Game, snapshot: Bitboard) -> Transition {
        if snapshot == self.physical.occupancy() {
            return Transition::None;
        }
        let step = self.physical.capture(snapshot);
        debug!(
            %snapshot,
            vacated = %step.vacated,
            occupied = %step.occupied,
            phase = %self.phase,
            "sensor change"
        );

        if self.phase == Phase::Desync {
            self.show_position(game);
            return Transition::None;
        }
        if snapshot == self.baseline {
            return self.take_back();
        }
        if self.phase == Phase::Idle {
            self.ctx = Context::start(game);
        }

        let side = game.side_to_move();
        if let Some(castle) = self.ctx.castling {
            if self.phase == Phase::CastlingWatch && step.vacated.contains(castle.king_to(side)) {
                info!(side = %side, "castling abandoned");
                self.ctx.castle_sides.clear();
                self.ctx.castling = None;
                self.push(PresentationRequest::status("castling abandoned"));
            }
        }

        let total = Delta::between(self.baseline, snapshot);
        let limit = self.change_limit(side, total);
        if step.count() > limit {
            return self.desync(game, total);
        }

        if let Some(transition) = self.castling(side, total) {
            return transition;
        }
        self.classify(side, total, step)
    }

    /// The confirm button of `side` was pressed.
    pub fn confirm_pressed(&mut self, game: &mut Game, side: Color) -> Transition {
        match self.phase {
            phase if phase.has_candidate() => {
                let Some(mv) = self.ctx.candidate else {
                    return self.rearm(side);
                };
                if side != game.side_to_move() {
                    self.push(PresentationRequest::status(format!(
                        "{} to move",
                        game.side_to_move()
                    )));
                    return Transition::Rejected(GameError::NotYourTurn(side));
                }
                self.play(game, mv, side)
            }
            Phase::PromotionPending => {
                if side != game.side_to_move() {
                    self.push(PresentationRequest::status(format!(
                        "{} to move",
                        game.side_to_move()
                    )));
                    return Transition::Rejected(GameError::NotYourTurn(side));
                }
                self.ctx.confirm_side = Some(side);
                self.push_promotion_choice(side);
                self.enter(Phase::AwaitingConfirm)
            }
            _ => self.rearm(side),
        }
    }

    /// A promotion piece was picked on the touchscreen.
    pub fn promotion_piece_selected(&mut self, game: &mut Game, kind: PieceKind) -> Transition {
        if !kind.is_promotion_target() {
            return Transition::None;
        }
        let pending = self.ctx.candidate;
        match (self.phase, pending) {
            (Phase::PromotionPending, Some(mv)) => self.propose(mv.with_promotion(kind)),
            (Phase::AwaitingConfirm, Some(mv)) if self.ctx.confirm_side.is_some() => {
                match self.propose(mv.with_promotion(kind)) {
                    Transition::Candidate(_) => {
                        let side = self.ctx.confirm_side.unwrap_or(game.side_to_move());
                        self.confirm_pressed(game, side)
                    }
                    other => other,
                }
            }
            (Phase::CandidatePending, Some(mv)) if mv.promotion().is_some() => {
                self.propose(mv.with_promotion(kind))
            }
            _ => {
                self.promotion_choice = Some(kind);
                self.push(PresentationRequest::status(format!("promote to {}", kind)));
                Transition::None
            }
        }
    }

    /// Accepts `snapshot` as the new baseline if it matches the rule
    /// engine's board. The only way out of [`Phase::Desync`].
    pub fn force_resync(&mut self, game: &Game, snapshot: Bitboard) -> Result<Transition, ResyncError> {
        self.physical.capture(snapshot);
        let mismatch = self.physical.mismatch(game.position());
        if !mismatch.is_empty() {
            self.show_position(game);
            return Err(ResyncError::Mismatch {
                missing: squares(mismatch.vacated),
                extra: squares(mismatch.occupied),
            });
        }

        self.physical.sync_mirror(game.position());
        self.baseline = snapshot;
        self.ctx = Context::default();
        self.phase = Phase::Idle;
        info!(fen = %game.position_fen(), "board resynchronized");
        self.push(PresentationRequest::Clear);
        self.push(PresentationRequest::status("board resynchronized"));
        Ok(Transition::Resynced)
    }

    /// Restricts the next move to the one the remote engine chose.
    pub fn set_expected_move(&mut self, game: &Game, mv: Option<Notation>) {
        self.expected = mv;
        if let Some(mv) = mv {
            let side = game.side_to_move();
            let (from, _) = mv.king_squares(side);
            self.push(PresentationRequest::status(format!("engine plays {}", mv)));
            self.push(PresentationRequest::highlight(from, [&mv], side));
        }
    }

    fn change_limit(&self, side: Color, total: Delta) -> u32 {
        let changed = total.changed();
        let castling = self.ctx.castle_sides.iter().any(|&castle| {
            changed.is_subset_of(castling_origin(side, castle) | castling_target(side, castle))
        });
        if castling {
            return CASTLING_LIMIT;
        }
        let en_passant = self
            .ctx
            .en_passant
            .iter()
            .any(|&mv| changed.is_subset_of(en_passant_squares(mv)));
        if en_passant {
            EN_PASSANT_LIMIT
        } else {
            NORMAL_LIMIT
        }
    }

    /// King and rook on their way to castling squares.
    fn castling(&mut self, side: Color, total: Delta) -> Option<Transition> {
        let king_from = CastleSide::king_from(side);
        if !total.vacated.contains(king_from) {
            return None;
        }
        if total.vacated.count() == 1 && total.occupied.is_empty() {
            return None;
        }

        let castle = self.ctx.castle_sides.iter().copied().find(|&castle| {
            total.vacated.is_subset_of(castling_origin(side, castle))
                && total.occupied.is_subset_of(castling_target(side, castle))
                && (!total.occupied.contains(castle.rook_to(side))
                    || total.vacated.contains(castle.rook_from(side)))
        })?;

        self.highlight_mover(king_from, side);
        if total.vacated == castling_origin(side, castle) && total.occupied == castling_target(side, castle) {
            self.ctx.castling = None;
            return Some(self.propose(Notation::castle(castle)));
        }

        let king_placed = total.occupied.contains(castle.king_to(side));
        if king_placed && self.ctx.castling.is_none() {
            self.push(PresentationRequest::status(format!(
                "move the rook to {}",
                castle.rook_to(side)
            )));
        }
        self.ctx.castling = king_placed.then_some(castle);
        self.ctx.candidate = None;
        Some(self.enter(Phase::CastlingWatch))
    }

    fn classify(&mut self, side: Color, total: Delta, step: Delta) -> Transition {
        let mirror = self.physical.mirror();
        let own = total.vacated & mirror.occupancy_of(side);
        let theirs = total.vacated & mirror.occupancy_of(side.opposite());

        if let Some(victim) = theirs.single_square() {
            self.ctx.victim = Some(victim);
            self.ctx.landed = false;
        }

        let from = match own.count() {
            0 => {
                return match theirs.single_square() {
                    Some(square) if total.occupied.is_empty() => {
                        self.ctx.candidate = None;
                        self.push(PresentationRequest::IllegalLift { square });
                        self.enter(Phase::CaptureLifted)
                    }
                    _ => self.illegal(None),
                };
            }
            1 => match own.single_square() {
                Some(sq) => sq,
                None => return self.illegal(None),
            },
            _ => {
                let extra = self.ctx.mover.map_or(own, |mover| own.without(mover));
                if let Some(square) = extra.into_iter().next() {
                    self.push(PresentationRequest::IllegalLift { square });
                }
                return self.illegal(None);
            }
        };

        self.highlight_mover(from, side);
        if theirs.count() > 1 {
            return self.illegal(None);
        }
        let victim = theirs.single_square();

        match total.occupied.count() {
            0 => {
                if victim.is_some() {
                    self.ctx.candidate = None;
                    return self.enter(Phase::CaptureLifted);
                }
                if let Some(target) = self.ctx.victim {
                    if self.ctx.landed || step.occupied.contains(target) {
                        self.ctx.landed = true;
                        return self.propose(Notation::capture(from, target));
                    }
                }
                self.ctx.candidate = None;
                let king_lifted = self
                    .physical
                    .piece_at(from)
                    .is_some_and(|piece| piece.is(side, PieceKind::King));
                if king_lifted && !self.ctx.castle_sides.is_empty() {
                    self.enter(Phase::CastlingWatch)
                } else {
                    self.enter(Phase::PieceLifted)
                }
            }
            1 => {
                let Some(to) = total.occupied.single_square() else {
                    return self.illegal(None);
                };
                let en_passant = self
                    .ctx
                    .en_passant
                    .iter()
                    .copied()
                    .find(|mv| mv.from() == Some(from) && mv.to() == Some(to));
                if let Some(mv) = en_passant {
                    let captured = en_passant_victim(mv);
                    return match victim {
                        Some(_) if victim == captured => self.propose(mv),
                        Some(_) => self.illegal(None),
                        None => {
                            if let Some(square) = captured {
                                self.push(PresentationRequest::status(format!(
                                    "remove the pawn on {}",
                                    square
                                )));
                            }
                            self.ctx.candidate = None;
                            self.enter(Phase::PieceLifted)
                        }
                    };
                }
                if victim.is_some() {
                    return self.illegal(None);
                }
                self.propose(Notation::quiet(from, to))
            }
            _ => self.illegal(None),
        }
    }

    /// Turns a move read off the board into the pending candidate, or
    /// rejects it.
    fn propose(&mut self, mv: Notation) -> Transition {
        let mut mv = mv;
        if self.needs_promotion(mv) {
            let choice = self
                .expected
                .and_then(Notation::promotion)
                .or(self.promotion_choice);
            match choice {
                Some(kind) => mv = mv.with_promotion(kind),
                None => {
                    if !self.accepts(mv.with_promotion(PieceKind::Queen)) {
                        return self.illegal(Some(mv));
                    }
                    self.ctx.candidate = Some(mv);
                    self.ctx.highlighted = false;
                    if let Some(piece) = mv.from().and_then(|sq| self.physical.piece_at(sq)) {
                        self.push_promotion_choice(piece.color);
                    }
                    return self.enter(Phase::PromotionPending);
                }
            }
        }

        if !self.accepts(mv) {
            return self.illegal(Some(mv));
        }
        debug!(candidate = %mv, "candidate move");
        self.ctx.candidate = Some(mv);
        self.ctx.highlighted = false;
        self.phase = if mv.castle_side().is_some() {
            Phase::CastlingPending
        } else {
            Phase::CandidatePending
        };
        self.push(PresentationRequest::Candidate {
            notation: mv.to_string(),
        });
        Transition::Candidate(mv)
    }

    fn needs_promotion(&self, mv: Notation) -> bool {
        match mv {
            Notation::Piece {
                from,
                to,
                promotion: None,
                ..
            } => self.physical.piece_at(from).is_some_and(|piece| {
                piece.kind == PieceKind::Pawn && to.rank_index() == piece.color.promotion_rank()
            }),
            _ => false,
        }
    }

    fn accepts(&self, mv: Notation) -> bool {
        match self.expected {
            Some(expected) => expected == mv,
            None => self.ctx.legal.contains(&mv),
        }
    }

    fn play(&mut self, game: &mut Game, mv: Notation, side: Color) -> Transition {
        match game.apply(mv, side) {
            Ok(outcome) => {
                info!(mv = %outcome.display, side = %side, "move confirmed");
                self.physical.sync_mirror(game.position());
                self.baseline = game.position().board.occupancy();
                self.ctx = Context::default();
                self.expected = None;
                self.promotion_choice = None;
                self.phase = Phase::Idle;

                self.push(PresentationRequest::Clear);
                self.push(PresentationRequest::status(outcome.display.clone()));
                if outcome.status.game_over {
                    self.push(PresentationRequest::GameOver {
                        result: game.result().to_string(),
                        termination: game
                            .termination()
                            .map(|t| t.to_string())
                            .unwrap_or_default(),
                    });
                }
                if self.physical.occupancy() != self.baseline {
                    warn!("board differs from the position after the move");
                    self.phase = Phase::Desync;
                    self.show_position(game);
                }
                Transition::Applied(outcome)
            }
            Err(e) => {
                warn!(mv = %mv, error = %e, "confirmed move rejected");
                self.ctx.candidate = None;
                self.ctx.confirm_side = None;
                self.phase = Phase::AwaitingConfirm;
                self.push(PresentationRequest::IllegalMove {
                    attempted: Some(mv.to_string()),
                });
                Transition::Rejected(e)
            }
        }
    }

    fn rearm(&mut self, side: Color) -> Transition {
        if self.phase != Phase::Idle {
            self.push(PresentationRequest::status("no move to confirm"));
        }
        Transition::ClockRearm(side)
    }

    fn take_back(&mut self) -> Transition {
        debug!(phase = %self.phase, "take-back");
        self.ctx = Context::default();
        self.promotion_choice = None;
        self.phase = Phase::Idle;
        self.push(PresentationRequest::Clear);
        Transition::TakeBack
    }

    fn desync(&mut self, game: &Game, total: Delta) -> Transition {
        warn!(changed = total.count(), phase = %self.phase, "sensor desync");
        self.ctx = Context::default();
        self.phase = Phase::Desync;
        self.push(PresentationRequest::status("set up the position shown"));
        self.show_position(game);
        Transition::Desync
    }

    fn illegal(&mut self, attempted: Option<Notation>) -> Transition {
        debug!(attempted = ?attempted, "illegal board state");
        self.ctx.candidate = None;
        self.ctx.highlighted = false;
        if self.phase != Phase::CaptureLifted {
            self.phase = Phase::PieceLifted;
        }
        self.push(PresentationRequest::IllegalMove {
            attempted: attempted.map(|mv| mv.to_string()),
        });
        Transition::Illegal
    }

    fn highlight_mover(&mut self, from: Square, side: Color) {
        if self.ctx.mover == Some(from) && self.ctx.highlighted {
            return;
        }
        self.ctx.mover = Some(from);
        self.ctx.highlighted = true;

        let moves: Vec<Notation> = self
            .ctx
            .legal
            .iter()
            .copied()
            .filter(|mv| mv.king_squares(side).0 == from)
            .collect();
        if moves.is_empty() {
            self.push(PresentationRequest::IllegalLift { square: from });
        } else {
            self.push(PresentationRequest::highlight(from, &moves, side));
        }
    }

    fn show_position(&mut self, game: &Game) {
        let mismatch = self.physical.mismatch(game.position());
        self.push(PresentationRequest::ShowPosition {
            fen: game.position_fen(),
            mismatched: squares(mismatch.changed()),
        });
    }

    fn push_promotion_choice(&mut self, color: Color) {
        if let Some(square) = self.ctx.candidate.and_then(Notation::to) {
            self.push(PresentationRequest::PromotionChoice { square, color });
        }
    }

    fn enter(&mut self, phase: Phase) -> Transition {
        self.phase = phase;
        Transition::Progress(phase)
    }

    fn push(&mut self, request: PresentationRequest) {
        self.outbox.push(request);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physical::STARTING_OCCUPANCY;

    fn sq(s: &str) -> Square {
        Square::from_algebraic(s).unwrap()
    }

    #[test]
    fn en_passant_geometry() {
        let mv = Notation::en_passant(sq("e5"), sq("d6"));
        assert_eq!(en_passant_victim(mv), Some(sq("d5")));
        assert_eq!(
            en_passant_squares(mv),
            Bitboard::from_squares([sq("e5"), sq("d6"), sq("d5")])
        );
        assert_eq!(en_passant_victim(Notation::castle(CastleSide::Kingside)), None);
    }

    #[test]
    fn limits_widen_only_inside_a_window() {
        let game = Game::from_fen("r3k2r/8/8/3pP3/8/8/8/R3K2R w KQkq d6 0 1").unwrap();
        let mut reconciler = Reconciler::new(&game);
        reconciler.ctx = Context::start(&game);
        let base = reconciler.baseline();

        let castle = Delta::between(
            base,
            base.without(sq("e1")).without(sq("h1")).with(sq("g1")).with(sq("f1")),
        );
        assert_eq!(reconciler.change_limit(Color::White, castle), CASTLING_LIMIT);

        let en_passant = Delta::between(base, base.without(sq("e5")).without(sq("d5")).with(sq("d6")));
        assert_eq!(reconciler.change_limit(Color::White, en_passant), EN_PASSANT_LIMIT);

        let noise = Delta::between(base, base.without(sq("a1")).without(sq("e5")).with(sq("a3")));
        assert_eq!(reconciler.change_limit(Color::White, noise), NORMAL_LIMIT);
    }

    #[test]
    fn context_collects_special_moves() {
        let game = Game::from_fen("r3k2r/8/8/3pP3/8/8/8/R3K2R w KQkq d6 0 1").unwrap();
        let ctx = Context::start(&game);
        assert_eq!(ctx.castle_sides.len(), 2);
        assert_eq!(ctx.en_passant, vec![Notation::en_passant(sq("e5"), sq("d6"))]);
        assert!(ctx.candidate.is_none());
    }

    #[test]
    fn new_reconciler_is_idle_on_the_start_position() {
        let game = Game::new();
        let reconciler = Reconciler::new(&game);
        assert_eq!(reconciler.phase(), Phase::Idle);
        assert_eq!(reconciler.baseline(), STARTING_OCCUPANCY);
        assert_eq!(reconciler.candidate(), None);
    }
}
