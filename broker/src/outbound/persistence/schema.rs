//! Diesel table definitions for the PostgreSQL schema.
//!
//! These definitions must match the migrations under `broker/migrations/`
//! exactly; Diesel uses them for compile-time query validation and
//! type-safe SQL generation. Regenerate with `diesel print-schema` when the
//! migrations change.

diesel::table! {
    /// Inventory items.
    ///
    /// One row per credential pair. `status` holds the lifecycle string and
    /// a partial unique index guarantees at most one `pending` row per
    /// `assigned_to` user.
    items (id) {
        /// Primary key, assigned by the store.
        id -> Int8,
        /// Login credential; unique across the pool.
        login -> Varchar,
        /// Secret credential.
        secret -> Varchar,
        /// Assigned first name; `Any` means wildcard.
        first_name -> Varchar,
        /// Assigned last name; `Any` means wildcard.
        last_name -> Varchar,
        /// Lifecycle status string.
        status -> Varchar,
        /// User currently bound to this item.
        assigned_to -> Nullable<Int8>,
        /// Creation timestamp; claims are FIFO by this column.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// User ledger rows.
    users (id) {
        /// Platform-assigned user identifier.
        id -> Int8,
        /// Display name captured at enrollment.
        display_name -> Varchar,
        /// Withdrawable balance.
        available -> Numeric,
        /// Balance held for submitted items awaiting review.
        hold -> Numeric,
        /// Payment-method map, merged key-by-key.
        payment_info -> Jsonb,
        /// Referrer link, set once at enrollment.
        referred_by -> Nullable<Int8>,
        /// Enrollment timestamp.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Withdrawal requests; the amount is reserved at insertion time.
    withdrawals (id) {
        /// Primary key, assigned by the store.
        id -> Int8,
        /// Requesting user.
        user_id -> Int8,
        /// Reserved amount.
        amount -> Numeric,
        /// Payout method name.
        method -> Varchar,
        /// Opaque payout details.
        details -> Text,
        /// Lifecycle status string.
        status -> Varchar,
        /// Request timestamp; the review queue is FIFO by this column.
        created_at -> Timestamptz,
    }
}

diesel::table! {
    /// Operator settings, one row per key.
    settings (key) {
        /// Setting name.
        key -> Varchar,
        /// Raw string value; typed parsing happens in the domain.
        value -> Text,
    }
}

diesel::table! {
    /// Administrator allowlist.
    admins (user_id) {
        /// Allowlisted user identifier.
        user_id -> Int8,
    }
}

diesel::table! {
    /// Notification outbox drained by the messaging collaborator.
    notifications (id) {
        /// Queue-unique message identifier.
        id -> Uuid,
        /// The user to notify.
        recipient -> Int8,
        /// Serialized notification event.
        payload -> Jsonb,
        /// Enqueue timestamp; delivery is FIFO by this column.
        created_at -> Timestamptz,
    }
}

diesel::allow_tables_to_appear_in_same_query!(items, users, withdrawals, settings, admins);
