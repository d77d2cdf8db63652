// ============================================================================
// Order Domain Model
// ============================================================================

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use super::{decimal_to_micros, micros_to_decimal};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

// ============================================================================
// Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(&self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

/// Order semantics. Variants carry the data that only makes sense for that
/// kind of order, so an iceberg without a display quantity or a stop without
/// a trigger is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum OrderType {
    Market,
    Limit,
    StopLoss { trigger_price: Decimal },
    /// Large privately negotiated order; never auto-executes against the book.
    OtcBlock,
    /// Rests with only `display_quantity` visible in depth.
    Iceberg { display_quantity: Decimal },
    Twap,
    /// Matches only when a counterparty covers the full remaining amount.
    AllOrNothing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum TimeInForce {
    /// Good Till Cancel - remains active until filled or cancelled
    GoodTillCancel,
    /// Immediate Or Cancel - fill immediately or cancel remainder
    ImmediateOrCancel,
    /// Fill Or Kill - fill entire order immediately or cancel all
    FillOrKill,
    /// Good Till Date - cancel automatically at specified time
    GoodTillDate(DateTime<Utc>),
}

/// Customer service tier. Modulates both fee discount and match priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ServiceTier {
    Standard,
    Premium,
    Institutional,
}

impl ServiceTier {
    /// Priority weight, multiplied by 100 in the priority score.
    pub fn weight(&self) -> i64 {
        match self {
            ServiceTier::Standard => 1,
            ServiceTier::Premium => 2,
            ServiceTier::Institutional => 3,
        }
    }
}

// ============================================================================
// Order State Machine
// ============================================================================

pub mod state {
    #[cfg(feature = "serde")]
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[repr(u8)]
    #[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
    pub enum OrderStatus {
        Pending = 0,
        Open = 1,
        PartiallyFilled = 2,
        /// Pinned by a match pass that has begun settlement.
        Matching = 3,
        /// Pinned by an open block-trade negotiation.
        Negotiating = 4,
        Filled = 5,
        Cancelled = 6,
        Expired = 7,
        Rejected = 8,
    }

    impl OrderStatus {
        pub fn from_u8(val: u8) -> Self {
            match val {
                0 => OrderStatus::Pending,
                1 => OrderStatus::Open,
                2 => OrderStatus::PartiallyFilled,
                3 => OrderStatus::Matching,
                4 => OrderStatus::Negotiating,
                5 => OrderStatus::Filled,
                6 => OrderStatus::Cancelled,
                7 => OrderStatus::Expired,
                _ => OrderStatus::Rejected,
            }
        }

        pub fn is_terminal(&self) -> bool {
            matches!(
                self,
                OrderStatus::Filled
                    | OrderStatus::Cancelled
                    | OrderStatus::Expired
                    | OrderStatus::Rejected
            )
        }

        /// Eligible as a match candidate.
        pub fn is_matchable(&self) -> bool {
            matches!(self, OrderStatus::Open | OrderStatus::PartiallyFilled)
        }

        /// Cancellation is rejected for terminal orders and for orders pinned
        /// mid-match, so a match already in settlement is never torn.
        pub fn can_be_cancelled(&self) -> bool {
            matches!(
                self,
                OrderStatus::Pending | OrderStatus::Open | OrderStatus::PartiallyFilled
            )
        }
    }
}

pub use state::OrderStatus;

// ============================================================================
// Audit Trail
// ============================================================================

/// Append-only lifecycle marker kept on the order record.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AuditEntry {
    pub action: String,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

// ============================================================================
// Order Request
// ============================================================================

/// Caller-facing order submission. The engine turns this into an [`Order`]
/// with computed priority and commission.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct OrderRequest {
    pub customer_id: String,
    pub asset: String,
    pub side: Side,
    pub order_type: OrderType,
    pub amount: Decimal,
    pub limit_price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub service_tier: ServiceTier,
    pub allow_partial_fill: bool,
    pub min_fill_size: Option<Decimal>,
    pub max_slippage: Option<Decimal>,
}

impl OrderRequest {
    pub fn new(
        customer_id: impl Into<String>,
        asset: impl Into<String>,
        side: Side,
        order_type: OrderType,
        amount: Decimal,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            asset: asset.into(),
            side,
            order_type,
            amount,
            limit_price: None,
            time_in_force: TimeInForce::GoodTillCancel,
            service_tier: ServiceTier::Standard,
            allow_partial_fill: true,
            min_fill_size: None,
            max_slippage: None,
        }
    }

    pub fn with_limit_price(mut self, price: Decimal) -> Self {
        self.limit_price = Some(price);
        self
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = tif;
        self
    }

    pub fn with_service_tier(mut self, tier: ServiceTier) -> Self {
        self.service_tier = tier;
        self
    }

    pub fn with_min_fill_size(mut self, size: Decimal) -> Self {
        self.min_fill_size = Some(size);
        self
    }

    pub fn with_max_slippage(mut self, slippage: Decimal) -> Self {
        self.max_slippage = Some(slippage);
        self
    }

    pub fn all_or_nothing(mut self) -> Self {
        self.allow_partial_fill = false;
        self
    }
}

// ============================================================================
// Order Entity
// ============================================================================

/// Order with atomic execution state for concurrent access.
///
/// Identity, classification and economics are immutable after placement;
/// fill progress, status and the audit trail mutate through the engine only.
#[derive(Debug)]
pub struct Order {
    pub id: OrderId,
    pub customer_id: Arc<String>,
    pub asset: Arc<String>,
    pub side: Side,
    pub order_type: OrderType,
    pub time_in_force: TimeInForce,
    pub service_tier: ServiceTier,

    /// Originally requested amount.
    pub amount: Decimal,
    pub limit_price: Option<Decimal>,

    /// Priority score assigned at placement (tier, size, time-priority base).
    pub priority: i64,
    /// Commission rate assigned at placement, after tier discount.
    pub commission_rate: Decimal,

    pub allow_partial_fill: bool,
    pub min_fill_size: Option<Decimal>,
    pub max_slippage: Option<Decimal>,

    pub created_at: DateTime<Utc>,

    // Atomic fields for lock-free updates (micros-scaled i64)
    filled: AtomicI64,
    remaining: AtomicI64,
    /// Sum of fill price * fill amount, for the running volume-weighted
    /// average fill price.
    filled_notional: AtomicI64,
    status: AtomicU8,
    sequence: AtomicU64,
    /// Unix millis; 0 means never.
    last_match_attempt: AtomicI64,
    updated_at: AtomicI64,

    negotiation_room: RwLock<Option<Uuid>>,
    audit_trail: RwLock<Vec<AuditEntry>>,
}

impl Order {
    /// Build an order from a validated request. Called by the engine only.
    pub fn from_request(
        request: &OrderRequest,
        priority: i64,
        commission_rate: Decimal,
        sequence: u64,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            customer_id: Arc::new(request.customer_id.clone()),
            asset: Arc::new(request.asset.clone()),
            side: request.side,
            order_type: request.order_type,
            time_in_force: request.time_in_force,
            service_tier: request.service_tier,
            amount: request.amount,
            limit_price: request.limit_price,
            priority,
            commission_rate,
            allow_partial_fill: request.allow_partial_fill,
            min_fill_size: request.min_fill_size,
            max_slippage: request.max_slippage,
            created_at: now,
            filled: AtomicI64::new(0),
            remaining: AtomicI64::new(decimal_to_micros(request.amount)),
            filled_notional: AtomicI64::new(0),
            status: AtomicU8::new(OrderStatus::Pending as u8),
            sequence: AtomicU64::new(sequence),
            last_match_attempt: AtomicI64::new(0),
            updated_at: AtomicI64::new(now.timestamp_millis()),
            negotiation_room: RwLock::new(None),
            audit_trail: RwLock::new(Vec::new()),
        }
    }

    // ========================================================================
    // Atomic Getters
    // ========================================================================

    pub fn filled_amount(&self) -> Decimal {
        micros_to_decimal(self.filled.load(Ordering::Acquire))
    }

    pub fn remaining_amount(&self) -> Decimal {
        micros_to_decimal(self.remaining.load(Ordering::Acquire))
    }

    pub fn status(&self) -> OrderStatus {
        OrderStatus::from_u8(self.status.load(Ordering::Acquire))
    }

    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::Acquire)
    }

    /// Volume-weighted average price across all fills so far.
    pub fn average_fill_price(&self) -> Option<Decimal> {
        let filled = self.filled.load(Ordering::Acquire);
        if filled == 0 {
            return None;
        }
        let notional = micros_to_decimal(self.filled_notional.load(Ordering::Acquire));
        Some(notional / micros_to_decimal(filled))
    }

    pub fn last_match_attempt(&self) -> Option<DateTime<Utc>> {
        let millis = self.last_match_attempt.load(Ordering::Acquire);
        if millis == 0 {
            return None;
        }
        DateTime::from_timestamp_millis(millis)
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.updated_at.load(Ordering::Acquire))
    }

    pub fn negotiation_room(&self) -> Option<Uuid> {
        *self.negotiation_room.read()
    }

    // ========================================================================
    // Atomic Operations
    // ========================================================================

    /// Atomically apply a fill at the given price.
    /// Returns false if the remaining amount cannot cover it.
    pub fn apply_fill(&self, amount: Decimal, price: Decimal) -> bool {
        let amount_micros = decimal_to_micros(amount);

        loop {
            let current_remaining = self.remaining.load(Ordering::Acquire);
            if current_remaining < amount_micros {
                return false;
            }

            let new_remaining = current_remaining - amount_micros;
            if self
                .remaining
                .compare_exchange(
                    current_remaining,
                    new_remaining,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                self.filled.fetch_add(amount_micros, Ordering::AcqRel);
                self.filled_notional
                    .fetch_add(decimal_to_micros(amount * price), Ordering::AcqRel);

                if new_remaining == 0 {
                    self.set_status(OrderStatus::Filled);
                } else {
                    self.set_status(OrderStatus::PartiallyFilled);
                }
                return true;
            }
            // CAS failed, retry
        }
    }

    pub fn set_status(&self, status: OrderStatus) {
        self.status.store(status as u8, Ordering::Release);
        self.touch();
    }

    /// Pin the order for an in-flight match. Succeeds only from a matchable
    /// status, so two concurrent passes can never claim the same order.
    pub fn try_begin_match(&self) -> bool {
        for from in [OrderStatus::Open, OrderStatus::PartiallyFilled] {
            if self
                .status
                .compare_exchange(
                    from as u8,
                    OrderStatus::Matching as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                self.touch();
                return true;
            }
        }
        false
    }

    /// Undo a [`Self::try_begin_match`] pin without applying any fill,
    /// restoring the pre-match status derived from fill progress.
    pub fn restore_resting_status(&self) {
        let restored = if self.filled.load(Ordering::Acquire) > 0 {
            OrderStatus::PartiallyFilled
        } else {
            OrderStatus::Open
        };
        self.set_status(restored);
    }

    pub fn try_cancel(&self) -> bool {
        loop {
            let current = self.status.load(Ordering::Acquire);
            if !OrderStatus::from_u8(current).can_be_cancelled() {
                return false;
            }
            if self
                .status
                .compare_exchange(
                    current,
                    OrderStatus::Cancelled as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                self.touch();
                return true;
            }
        }
    }

    /// Expire an overdue GTD order. Same guard set as cancellation.
    pub fn try_expire(&self) -> bool {
        loop {
            let current = self.status.load(Ordering::Acquire);
            if !OrderStatus::from_u8(current).can_be_cancelled() {
                return false;
            }
            if self
                .status
                .compare_exchange(
                    current,
                    OrderStatus::Expired as u8,
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                self.touch();
                return true;
            }
        }
    }

    pub fn record_match_attempt(&self) {
        self.last_match_attempt
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }

    pub fn assign_negotiation_room(&self, room: Uuid) {
        *self.negotiation_room.write() = Some(room);
        self.touch();
    }

    fn touch(&self) {
        self.updated_at
            .store(Utc::now().timestamp_millis(), Ordering::Release);
    }

    // ========================================================================
    // Audit Trail
    // ========================================================================

    pub fn audit(&self, action: impl Into<String>, detail: impl Into<String>) {
        self.audit_trail.write().push(AuditEntry {
            action: action.into(),
            detail: detail.into(),
            timestamp: Utc::now(),
        });
    }

    pub fn audit_trail(&self) -> Vec<AuditEntry> {
        self.audit_trail.read().clone()
    }

    // ========================================================================
    // Helper Methods
    // ========================================================================

    pub fn is_market_order(&self) -> bool {
        matches!(self.order_type, OrderType::Market)
    }

    pub fn is_limit_order(&self) -> bool {
        matches!(
            self.order_type,
            OrderType::Limit | OrderType::Iceberg { .. } | OrderType::StopLoss { .. }
        )
    }

    pub fn is_block_order(&self) -> bool {
        matches!(self.order_type, OrderType::OtcBlock)
    }

    /// Whether a fill smaller than the full remaining amount is acceptable.
    pub fn allows_partial_fill(&self) -> bool {
        self.allow_partial_fill && !matches!(self.order_type, OrderType::AllOrNothing)
    }

    /// Quantity exposed in book depth. Iceberg orders show at most their
    /// display quantity.
    pub fn visible_quantity(&self) -> Decimal {
        let remaining = self.remaining_amount();
        match self.order_type {
            OrderType::Iceberg { display_quantity } => display_quantity.min(remaining),
            _ => remaining,
        }
    }

    /// Whether a GTD order has passed its deadline.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.time_in_force {
            TimeInForce::GoodTillDate(deadline) => now >= deadline,
            _ => false,
        }
    }
}

impl Clone for Order {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            customer_id: Arc::clone(&self.customer_id),
            asset: Arc::clone(&self.asset),
            side: self.side,
            order_type: self.order_type,
            time_in_force: self.time_in_force,
            service_tier: self.service_tier,
            amount: self.amount,
            limit_price: self.limit_price,
            priority: self.priority,
            commission_rate: self.commission_rate,
            allow_partial_fill: self.allow_partial_fill,
            min_fill_size: self.min_fill_size,
            max_slippage: self.max_slippage,
            created_at: self.created_at,
            filled: AtomicI64::new(self.filled.load(Ordering::Acquire)),
            remaining: AtomicI64::new(self.remaining.load(Ordering::Acquire)),
            filled_notional: AtomicI64::new(self.filled_notional.load(Ordering::Acquire)),
            status: AtomicU8::new(self.status.load(Ordering::Acquire)),
            sequence: AtomicU64::new(self.sequence.load(Ordering::Acquire)),
            last_match_attempt: AtomicI64::new(self.last_match_attempt.load(Ordering::Acquire)),
            updated_at: AtomicI64::new(self.updated_at.load(Ordering::Acquire)),
            negotiation_room: RwLock::new(*self.negotiation_room.read()),
            audit_trail: RwLock::new(self.audit_trail.read().clone()),
        }
    }
}
