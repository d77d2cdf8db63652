// ============================================================================
// Negotiation Coordinator
// State machine and timeout policy for block-trade negotiation
// ============================================================================

use crate::domain::{Match, MatchId, MatchStatus, NegotiationSession, SessionStatus};
use crate::error::{EngineError, EngineResult};
use crate::interfaces::{EngineEvent, EventHandler};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Coordinates multi-party negotiation for matches the engine routes here
/// instead of auto-executing.
///
/// Each open session carries a hard deadline enforced by a cancellable timer
/// task: if the counterparties have not agreed when it fires, the session and
/// its match are forced to the disputed terminal state so no resource is held
/// open-ended. The timer is cancelled the moment a session reaches any
/// terminal state through another path.
pub struct NegotiationCoordinator {
    sessions: Arc<RwLock<HashMap<MatchId, NegotiationSession>>>,
    /// Match ledger shared with the engine.
    matches: Arc<RwLock<HashMap<MatchId, Match>>>,
    timers: Mutex<HashMap<MatchId, JoinHandle<()>>>,
    timeout: Duration,
    moderator: String,
    event_handler: Arc<dyn EventHandler>,
}

impl NegotiationCoordinator {
    pub fn new(
        timeout: Duration,
        moderator: impl Into<String>,
        matches: Arc<RwLock<HashMap<MatchId, Match>>>,
        event_handler: Arc<dyn EventHandler>,
    ) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            matches,
            timers: Mutex::new(HashMap::new()),
            timeout,
            moderator: moderator.into(),
            event_handler,
        }
    }

    /// Open a room for a negotiating match, invite both counterparties and
    /// start the deadline timer.
    pub fn open_session(&self, m: &Match) -> (Uuid, Vec<EngineEvent>) {
        let deadline = Utc::now()
            + chrono::Duration::from_std(self.timeout)
                .unwrap_or_else(|_| chrono::Duration::days(1));
        let session = NegotiationSession::open(
            m.id,
            self.moderator.clone(),
            m.buyer_id.clone(),
            m.seller_id.clone(),
            deadline,
        );
        let room_id = session.room_id;

        let events = vec![EngineEvent::NegotiationOpened {
            match_id: m.id,
            room_id,
            moderator: self.moderator.clone(),
            buyer_id: m.buyer_id.clone(),
            seller_id: m.seller_id.clone(),
            deadline,
            timestamp: Utc::now(),
        }];

        self.sessions.write().insert(m.id, session);
        self.spawn_deadline_timer(m.id);

        tracing::info!(match_id = %m.id, room_id = %room_id, "negotiation room opened");
        (room_id, events)
    }

    /// Append an offer to an open session's history.
    pub fn submit_offer(
        &self,
        match_id: MatchId,
        party: &str,
        price: Decimal,
    ) -> EngineResult<Vec<EngineEvent>> {
        let mut sessions = self.sessions.write();
        let session = Self::open_session_mut(&mut sessions, match_id, party)?;
        session.record_offer(party, price, false);

        Ok(vec![EngineEvent::OfferSubmitted {
            match_id,
            party: party.to_string(),
            price,
            accepted: false,
            timestamp: Utc::now(),
        }])
    }

    /// Record an explicit acceptance at a price. Returns `true` once both
    /// counterparties have accepted the same price, at which point the match
    /// is agreed at that price and the deadline timer is cancelled.
    pub fn accept(
        &self,
        match_id: MatchId,
        party: &str,
        price: Decimal,
    ) -> EngineResult<(Vec<EngineEvent>, bool)> {
        let mut events = Vec::new();
        let agreed = {
            let mut sessions = self.sessions.write();
            let session = Self::open_session_mut(&mut sessions, match_id, party)?;
            session.record_offer(party, price, true);
            events.push(EngineEvent::OfferSubmitted {
                match_id,
                party: party.to_string(),
                price,
                accepted: true,
                timestamp: Utc::now(),
            });

            if session.is_agreed_at(price) {
                session.status = SessionStatus::Agreed;
                session.agreed_price = Some(price);
                true
            } else {
                false
            }
        };

        if agreed {
            if let Some(m) = self.matches.write().get_mut(&match_id) {
                m.status = MatchStatus::Agreed;
                m.price = price;
            }
            self.cancel_timer(match_id);
            events.push(EngineEvent::NegotiationAgreed {
                match_id,
                price,
                timestamp: Utc::now(),
            });
            tracing::info!(match_id = %match_id, %price, "negotiation agreed");
        }

        Ok((events, agreed))
    }

    /// Explicit rejection by either counterparty: session and match move to
    /// their disputed terminal states.
    pub fn reject(&self, match_id: MatchId, party: &str) -> EngineResult<Vec<EngineEvent>> {
        {
            let mut sessions = self.sessions.write();
            let session = Self::open_session_mut(&mut sessions, match_id, party)?;
            session.status = SessionStatus::Rejected;
        }

        if let Some(m) = self.matches.write().get_mut(&match_id) {
            m.mark_disputed();
        }
        self.cancel_timer(match_id);
        tracing::warn!(match_id = %match_id, party, "negotiation rejected");

        Ok(vec![
            EngineEvent::NegotiationRejected {
                match_id,
                party: party.to_string(),
                timestamp: Utc::now(),
            },
            EngineEvent::MatchDisputed {
                match_id,
                reason: format!("negotiation rejected by {}", party),
                timestamp: Utc::now(),
            },
        ])
    }

    pub fn session(&self, match_id: MatchId) -> Option<NegotiationSession> {
        self.sessions.read().get(&match_id).cloned()
    }

    /// Abort every outstanding deadline timer.
    pub fn shutdown(&self) {
        for (_, handle) in self.timers.lock().drain() {
            handle.abort();
        }
    }

    // ========================================================================
    // Private methods
    // ========================================================================

    fn open_session_mut<'a>(
        sessions: &'a mut HashMap<MatchId, NegotiationSession>,
        match_id: MatchId,
        party: &str,
    ) -> EngineResult<&'a mut NegotiationSession> {
        let session = sessions
            .get_mut(&match_id)
            .ok_or(EngineError::NegotiationClosed { match_id })?;
        if session.status.is_terminal() {
            return Err(EngineError::NegotiationClosed { match_id });
        }
        if !session.is_counterparty(party) {
            return Err(EngineError::UnknownParty {
                match_id,
                party: party.to_string(),
            });
        }
        Ok(session)
    }

    fn spawn_deadline_timer(&self, match_id: MatchId) {
        let sessions = Arc::clone(&self.sessions);
        let matches = Arc::clone(&self.matches);
        let event_handler = Arc::clone(&self.event_handler);
        let timeout = self.timeout;

        let handle = tokio::spawn(async move {
            tokio::time::sleep(timeout).await;

            // The status check makes the timer a no-op against any session
            // that reached a terminal state before the abort landed.
            let parties = {
                let mut sessions = sessions.write();
                let Some(session) = sessions.get_mut(&match_id) else {
                    return;
                };
                if session.status.is_terminal() {
                    return;
                }
                session.status = SessionStatus::TimedOut;
                (session.buyer_id.clone(), session.seller_id.clone())
            };

            if let Some(m) = matches.write().get_mut(&match_id) {
                m.mark_disputed();
            }

            tracing::warn!(match_id = %match_id, "negotiation timed out, match disputed");
            event_handler.on_events(vec![
                EngineEvent::NegotiationTimedOut {
                    match_id,
                    buyer_id: parties.0,
                    seller_id: parties.1,
                    timestamp: Utc::now(),
                },
                EngineEvent::MatchDisputed {
                    match_id,
                    reason: "negotiation timed out".to_string(),
                    timestamp: Utc::now(),
                },
            ]);
        });

        self.timers.lock().insert(match_id, handle);
    }

    fn cancel_timer(&self, match_id: MatchId) {
        if let Some(handle) = self.timers.lock().remove(&match_id) {
            handle.abort();
        }
    }
}
