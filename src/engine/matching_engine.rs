// ============================================================================
// Matching Engine
// Core business logic for order matching and settlement hand-off
// ============================================================================

use crate::domain::{
    EngineConfig, Match, MatchId, MatchStatus, NegotiationSession, Order, OrderBook,
    OrderBookSnapshot, OrderId, OrderRequest, OrderStatus, Side, TimeInForce,
};
use crate::engine::fees::FeeCalculator;
use crate::engine::negotiation::NegotiationCoordinator;
use crate::engine::price_priority::{
    can_match, is_triggered, matchable_amount, matched_price, price_improvement, priority_score,
    within_slippage,
};
use crate::engine::validator::OrderValidator;
use crate::error::{EngineError, EngineResult};
use crate::interfaces::{
    ComplianceGateway, CustomerLimitsProvider, EngineEvent, EventHandler, PriceFeed,
    SettlementError, SettlementGateway,
};
use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Order matching engine for an OTC desk.
///
/// Owns one book per tradable asset, an order store, and an in-memory match
/// ledger. All collaborators are injected; the engine itself performs no
/// notification, audit or persistence I/O.
///
/// Concurrency model: each asset's book is an independently lockable unit,
/// so mutations on different assets proceed in parallel while a single
/// book's candidate selection and fill application are serialized. The only
/// suspension points are settlement calls and negotiation timers; the book
/// lock is never held across them. Orders participating in an in-flight
/// match are pinned in the `Matching` status, which removes them from
/// candidate sets and blocks cancellation until the match resolves.
pub struct MatchingEngine {
    config: EngineConfig,
    validator: OrderValidator,
    fees: FeeCalculator,
    negotiation: NegotiationCoordinator,

    books: RwLock<HashMap<String, Arc<RwLock<OrderBook>>>>,
    orders: RwLock<HashMap<OrderId, Arc<Order>>>,
    matches: Arc<RwLock<HashMap<MatchId, Match>>>,

    settlement: Arc<dyn SettlementGateway>,
    compliance: Arc<dyn ComplianceGateway>,
    limits: Arc<dyn CustomerLimitsProvider>,
    price_feed: Arc<dyn PriceFeed>,
    event_handler: Arc<dyn EventHandler>,

    sequence_counter: AtomicU64,
    sweep_task: Mutex<Option<JoinHandle<()>>>,
}

impl MatchingEngine {
    /// Create a new matching engine. Prefer [`MatchingEngineBuilder`] unless
    /// every collaborator is being wired explicitly.
    ///
    /// [`MatchingEngineBuilder`]: crate::engine::MatchingEngineBuilder
    pub fn new(
        config: EngineConfig,
        settlement: Arc<dyn SettlementGateway>,
        compliance: Arc<dyn ComplianceGateway>,
        limits: Arc<dyn CustomerLimitsProvider>,
        price_feed: Arc<dyn PriceFeed>,
        event_handler: Arc<dyn EventHandler>,
    ) -> Self {
        let matches: Arc<RwLock<HashMap<MatchId, Match>>> = Arc::new(RwLock::new(HashMap::new()));
        let negotiation = NegotiationCoordinator::new(
            config.negotiation_timeout,
            config.moderator.clone(),
            Arc::clone(&matches),
            Arc::clone(&event_handler),
        );
        Self {
            validator: OrderValidator::new(&config),
            fees: FeeCalculator::new(config.fee_schedule.clone()),
            negotiation,
            config,
            books: RwLock::new(HashMap::new()),
            orders: RwLock::new(HashMap::new()),
            matches,
            settlement,
            compliance,
            limits,
            price_feed,
            event_handler,
            sequence_counter: AtomicU64::new(0),
            sweep_task: Mutex::new(None),
        }
    }

    // ========================================================================
    // Order placement
    // ========================================================================

    /// Validate, price and open an order, then attempt an immediate match
    /// against the opposite side of its asset's book.
    pub async fn place_order(&self, request: OrderRequest) -> EngineResult<Arc<Order>> {
        let limits = self.limits.limits(&request.customer_id);
        let market = self.price_feed.market_price(&request.asset);
        let reference_price = request.limit_price.or(market).unwrap_or(Decimal::ONE);

        let priority = priority_score(request.service_tier, request.amount);
        let rate = self
            .fees
            .commission_rate(request.amount * reference_price, request.service_tier);
        let sequence = self.sequence_counter.fetch_add(1, Ordering::AcqRel);
        let order = Arc::new(Order::from_request(&request, priority, rate, sequence));

        if let Err(reasons) = self.validator.validate(&request, &limits) {
            order.set_status(OrderStatus::Rejected);
            order.audit("rejected", reasons.join("; "));
            self.orders.write().insert(order.id, Arc::clone(&order));
            self.event_handler.on_event(EngineEvent::OrderRejected {
                order_id: order.id,
                reasons: reasons.clone(),
                timestamp: Utc::now(),
            });
            tracing::debug!(order_id = %order.id, ?reasons, "order rejected");
            return Err(EngineError::Rejected { reasons });
        }

        let mut events = vec![EngineEvent::OrderPlaced {
            order_id: order.id,
            asset: request.asset.clone(),
            side: order.side,
            amount: order.amount,
            timestamp: Utc::now(),
        }];
        order.audit("placed", format!("{:?} {} {}", order.side, order.amount, order.asset));
        self.orders.write().insert(order.id, Arc::clone(&order));

        let book = self.book_for(&request.asset);
        order.set_status(OrderStatus::Open);

        // FOK liquidity pre-scan: if the full amount is not immediately
        // matchable the order is killed whole and the book stays untouched.
        if matches!(order.time_in_force, TimeInForce::FillOrKill)
            && self.immediately_matchable(&order, &book) < order.amount
        {
            let reason = "fill-or-kill: insufficient matchable liquidity";
            order.set_status(OrderStatus::Cancelled);
            order.audit("cancelled", reason);
            events.push(EngineEvent::OrderCancelled {
                order_id: order.id,
                reason: reason.to_string(),
                timestamp: Utc::now(),
            });
            self.event_handler.on_events(events);
            return Ok(order);
        }

        order.audit("opened", format!("priority {}", order.priority));
        if order.limit_price.is_some() {
            book.write().insert(Arc::clone(&order));
        }
        events.push(EngineEvent::OrderOpened {
            order_id: order.id,
            price: order.limit_price,
            quantity: order.amount,
            timestamp: Utc::now(),
        });

        events.extend(self.attempt_match(&order, &book).await);

        // IOC/FOK remainders and unpriced market remainders never rest
        let immediate = matches!(
            order.time_in_force,
            TimeInForce::ImmediateOrCancel | TimeInForce::FillOrKill
        ) || order.limit_price.is_none();
        if immediate
            && order.status().is_matchable()
            && order.remaining_amount() > Decimal::ZERO
            && order.try_cancel()
        {
            book.write().remove(&order.id);
            let reason = "unmatched immediate remainder cancelled";
            order.audit("cancelled", reason);
            events.push(EngineEvent::OrderCancelled {
                order_id: order.id,
                reason: reason.to_string(),
                timestamp: Utc::now(),
            });
        }

        self.event_handler.on_events(events);
        Ok(order)
    }

    /// Cancel a live order. Fails without side effects for terminal orders
    /// and for orders pinned by an in-flight match or negotiation.
    pub async fn cancel_order(&self, order_id: OrderId, reason: &str) -> EngineResult<()> {
        let order = self
            .get_order(&order_id)
            .ok_or(EngineError::UnknownOrder { order_id })?;

        if !order.try_cancel() {
            return Err(EngineError::CancellationConflict {
                order_id,
                status: order.status(),
            });
        }

        if let Some(book) = self.books.read().get(order.asset.as_str()) {
            book.write().remove(&order_id);
        }
        order.audit("cancelled", reason);

        if let Err(err) = self.settlement.release_funds(&order).await {
            tracing::warn!(order_id = %order_id, %err, "fund release failed after cancel");
        }

        self.event_handler.on_event(EngineEvent::OrderCancelled {
            order_id,
            reason: reason.to_string(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn get_order(&self, order_id: &OrderId) -> Option<Arc<Order>> {
        self.orders.read().get(order_id).cloned()
    }

    pub fn get_order_book(&self, asset: &str, depth: usize) -> Option<OrderBookSnapshot> {
        self.books
            .read()
            .get(asset)
            .map(|book| book.read().snapshot(depth))
    }

    pub fn get_match(&self, match_id: &MatchId) -> Option<Match> {
        self.matches.read().get(match_id).cloned()
    }

    pub fn matches_for_order(&self, order_id: &OrderId) -> Vec<Match> {
        self.matches
            .read()
            .values()
            .filter(|m| m.involves_order(order_id))
            .cloned()
            .collect()
    }

    pub fn negotiation_session(&self, match_id: MatchId) -> Option<NegotiationSession> {
        self.negotiation.session(match_id)
    }

    // ========================================================================
    // Negotiation
    // ========================================================================

    /// Forward an offer into an open negotiation.
    pub fn submit_offer(
        &self,
        match_id: MatchId,
        party: &str,
        price: Decimal,
    ) -> EngineResult<()> {
        let events = self.negotiation.submit_offer(match_id, party, price)?;
        self.event_handler.on_events(events);
        Ok(())
    }

    /// Record a counterparty's acceptance. When both sides have accepted the
    /// same price the match executes through the regular settlement path at
    /// the agreed price.
    pub async fn accept_offer(
        &self,
        match_id: MatchId,
        party: &str,
        price: Decimal,
    ) -> EngineResult<Match> {
        let (events, agreed) = self.negotiation.accept(match_id, party, price)?;
        self.event_handler.on_events(events);

        if agreed {
            let m = self
                .get_match(&match_id)
                .ok_or(EngineError::NegotiationClosed { match_id })?;
            let buy = self.get_order(&m.buy_order_id).ok_or(EngineError::UnknownOrder {
                order_id: m.buy_order_id,
            })?;
            let sell = self.get_order(&m.sell_order_id).ok_or(EngineError::UnknownOrder {
                order_id: m.sell_order_id,
            })?;

            // Fees follow the agreed price, not the originally proposed one
            let mut m = m;
            m.buyer_fee = self.fees.compute_fee(m.amount * m.price, buy.service_tier);
            m.seller_fee = self.fees.compute_fee(m.amount * m.price, sell.service_tier);

            buy.set_status(OrderStatus::Matching);
            sell.set_status(OrderStatus::Matching);

            let book = self.book_for(&m.asset);
            let (events, settled) = self.execute_match(m, &buy, &sell, &book).await;
            self.event_handler.on_events(events);
            if let Err(err) = settled {
                return Err(EngineError::SettlementFailed {
                    match_id,
                    reason: err.reason,
                });
            }
        }

        self.get_match(&match_id)
            .ok_or(EngineError::NegotiationClosed { match_id })
    }

    /// Explicitly walk away from a negotiation, disputing the match.
    pub fn reject_negotiation(&self, match_id: MatchId, party: &str) -> EngineResult<()> {
        let events = self.negotiation.reject(match_id, party)?;
        self.event_handler.on_events(events);
        Ok(())
    }

    // ========================================================================
    // Background sweep
    // ========================================================================

    /// Start the periodic sweep that re-attempts matching for resting orders
    /// and expires overdue GTD orders. Call on a clone of the engine handle.
    pub fn startup(self: Arc<Self>) {
        let engine = Arc::clone(&self);
        let mut task = self.sweep_task.lock();
        if task.is_some() {
            return;
        }
        let interval = self.config.sweep_interval;
        *task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                engine.sweep_once().await;
            }
        }));
        tracing::info!(interval = ?interval, "matching sweep started");
    }

    /// Stop the sweep and abort outstanding negotiation timers.
    pub async fn shutdown(&self) {
        if let Some(task) = self.sweep_task.lock().take() {
            task.abort();
        }
        self.negotiation.shutdown();
        tracing::info!("matching engine shut down");
    }

    /// One sweep pass over every book: a standing order matches a
    /// later-arriving counterparty without the counterparty's own placement
    /// call having to do all the work.
    pub async fn sweep_once(&self) {
        let books: Vec<Arc<RwLock<OrderBook>>> = self.books.read().values().cloned().collect();
        let now = Utc::now();

        for book in books {
            let resting = book.read().resting_orders();
            for order in resting {
                if order.is_expired(now) && order.try_expire() {
                    book.write().remove(&order.id);
                    order.audit("expired", "good-till-date deadline passed");
                    self.event_handler.on_event(EngineEvent::OrderExpired {
                        order_id: order.id,
                        timestamp: Utc::now(),
                    });
                    continue;
                }
                if order.status().is_matchable() && order.remaining_amount() > Decimal::ZERO {
                    let events = self.attempt_match(&order, &book).await;
                    if !events.is_empty() {
                        self.event_handler.on_events(events);
                    }
                }
            }
        }
    }

    // ========================================================================
    // Private methods
    // ========================================================================

    fn book_for(&self, asset: &str) -> Arc<RwLock<OrderBook>> {
        if let Some(book) = self.books.read().get(asset) {
            return Arc::clone(book);
        }
        let mut books = self.books.write();
        Arc::clone(
            books
                .entry(asset.to_string())
                .or_insert_with(|| Arc::new(RwLock::new(OrderBook::new(asset)))),
        )
    }

    /// Total amount immediately matchable for `order` against the current
    /// counter side, in book priority order.
    fn immediately_matchable(&self, order: &Arc<Order>, book: &Arc<RwLock<OrderBook>>) -> Decimal {
        let market = self.price_feed.market_price(&order.asset);
        if !is_triggered(order, market) {
            return Decimal::ZERO;
        }
        let mut needed = order.remaining_amount();
        let mut available = Decimal::ZERO;

        let book = book.read();
        for candidate in book.candidates(order.side.opposite()) {
            if needed <= Decimal::ZERO {
                break;
            }
            if !is_triggered(&candidate, market) {
                continue;
            }
            if !can_match(order, &candidate, &*self.compliance) {
                continue;
            }
            let Some(price) = matched_price(order, &candidate, market) else {
                continue;
            };
            if !within_slippage(order, price, market) || !within_slippage(&candidate, price, market)
            {
                continue;
            }
            let take = candidate.remaining_amount().min(needed);
            available += take;
            needed -= take;
        }
        available
    }

    /// Match `order` against counter-side candidates in strict
    /// price/priority/time order until it fills, routes to negotiation, or
    /// candidates are exhausted.
    async fn attempt_match(
        &self,
        order: &Arc<Order>,
        book: &Arc<RwLock<OrderBook>>,
    ) -> Vec<EngineEvent> {
        let mut events = Vec::new();
        order.record_match_attempt();

        loop {
            if !order.status().is_matchable() || order.remaining_amount() <= Decimal::ZERO {
                break;
            }

            let market = self.price_feed.market_price(&order.asset);
            // Dormant stops take no liquidity until the feed arms them
            if !is_triggered(order, market) {
                break;
            }

            // Candidate selection under the book lock; the lock is dropped
            // before any settlement await.
            let selected = {
                let book = book.read();
                book.candidates(order.side.opposite())
                    .into_iter()
                    .find_map(|candidate| {
                        if !is_triggered(&candidate, market) {
                            return None;
                        }
                        if !can_match(order, &candidate, &*self.compliance) {
                            return None;
                        }
                        let price = matched_price(order, &candidate, market)?;
                        if !within_slippage(order, price, market)
                            || !within_slippage(&candidate, price, market)
                        {
                            return None;
                        }
                        Some((candidate, price))
                    })
            };
            let Some((candidate, price)) = selected else {
                break;
            };
            candidate.record_match_attempt();

            // Pin both legs before anything can suspend
            if !candidate.try_begin_match() {
                continue;
            }
            if !order.try_begin_match() {
                candidate.restore_resting_status();
                break;
            }

            let amount = matchable_amount(order, &candidate);
            let (buy, sell) = match order.side {
                Side::Buy => (order, &candidate),
                Side::Sell => (&candidate, order),
            };
            let improvement = price_improvement(order.side, price, market);
            let buyer_fee = self.fees.compute_fee(amount * price, buy.service_tier);
            let seller_fee = self.fees.compute_fee(amount * price, sell.service_tier);
            let m = Match::proposed(buy, sell, amount, price, improvement, buyer_fee, seller_fee);

            events.push(EngineEvent::MatchProposed {
                match_id: m.id,
                buy_order_id: m.buy_order_id,
                sell_order_id: m.sell_order_id,
                amount,
                price,
                timestamp: Utc::now(),
            });

            // Block trades negotiate instead of auto-executing
            if order.is_block_order() || candidate.is_block_order() {
                events.extend(self.open_negotiation(m, order, &candidate));
                break;
            }

            self.matches.write().insert(m.id, m.clone());
            let (exec_events, settled) = self.execute_match(m, order, &candidate, book).await;
            events.extend(exec_events);
            if settled.is_err() {
                break;
            }
        }

        events
    }

    /// Route a block match to the negotiation coordinator. Both legs are
    /// held in `Negotiating` until the session resolves.
    fn open_negotiation(
        &self,
        mut m: Match,
        order: &Arc<Order>,
        candidate: &Arc<Order>,
    ) -> Vec<EngineEvent> {
        m.status = MatchStatus::Negotiating;
        order.set_status(OrderStatus::Negotiating);
        candidate.set_status(OrderStatus::Negotiating);

        let (room_id, events) = self.negotiation.open_session(&m);
        order.assign_negotiation_room(room_id);
        candidate.assign_negotiation_room(room_id);
        order.audit("negotiating", format!("room {}", room_id));
        candidate.audit("negotiating", format!("room {}", room_id));

        self.matches.write().insert(m.id, m);
        events
    }

    /// Execute an agreed or directly-proposed match through settlement.
    ///
    /// Fills are applied only after settlement succeeds. On failure the
    /// match is disputed and both legs keep their pre-fill status but leave
    /// the live book: a disputed pairing is reconciled manually, never
    /// silently re-queued.
    async fn execute_match(
        &self,
        mut m: Match,
        a: &Arc<Order>,
        b: &Arc<Order>,
        book: &Arc<RwLock<OrderBook>>,
    ) -> (Vec<EngineEvent>, Result<(), SettlementError>) {
        let mut events = Vec::new();

        match self.settlement.settle(&m).await {
            Ok(receipt) => {
                m.mark_executed();
                events.push(EngineEvent::MatchExecuted {
                    match_id: m.id,
                    amount: m.amount,
                    price: m.price,
                    timestamp: Utc::now(),
                });

                for order in [a, b] {
                    if !order.apply_fill(m.amount, m.price) {
                        tracing::error!(
                            order_id = %order.id,
                            match_id = %m.id,
                            "fill exceeded remaining amount"
                        );
                    }
                    order.audit("fill", format!("{} @ {} match {}", m.amount, m.price, m.id));
                }

                m.mark_settled(receipt.reference.clone());
                {
                    let mut book = book.write();
                    book.record_trade(m.amount, m.price);
                    for order in [a, b] {
                        if order.status() == OrderStatus::Filled {
                            book.remove(&order.id);
                        }
                    }
                }

                events.push(EngineEvent::MatchSettled {
                    match_id: m.id,
                    settlement_reference: receipt.reference,
                    timestamp: Utc::now(),
                });
                for order in [a, b] {
                    events.push(match order.status() {
                        OrderStatus::Filled => EngineEvent::OrderFilled {
                            order_id: order.id,
                            total_filled: order.filled_amount(),
                            average_price: order.average_fill_price(),
                            timestamp: Utc::now(),
                        },
                        _ => EngineEvent::OrderPartiallyFilled {
                            order_id: order.id,
                            filled_quantity: order.filled_amount(),
                            remaining_quantity: order.remaining_amount(),
                            timestamp: Utc::now(),
                        },
                    });
                }

                self.matches.write().insert(m.id, m);
                (events, Ok(()))
            },
            Err(err) => {
                tracing::warn!(match_id = %m.id, %err, "settlement failed, match disputed");
                m.mark_disputed();

                for order in [a, b] {
                    order.restore_resting_status();
                    order.audit("settlement-failed", format!("match {}: {}", m.id, err));
                }
                {
                    let mut book = book.write();
                    book.remove(&a.id);
                    book.remove(&b.id);
                }

                events.push(EngineEvent::MatchDisputed {
                    match_id: m.id,
                    reason: err.to_string(),
                    timestamp: Utc::now(),
                });
                self.matches.write().insert(m.id, m);
                (events, Err(err))
            },
        }
    }
}
