// Account identifiers.
//
// Shadow accounts get a UUIDv7 so ids sort by provisioning time, both in the
// in-memory store and in the `accounts` table.

use uuid::Uuid;

/// Generate a fresh account id (UUIDv7, timestamp-sortable).
pub fn new_account_id() -> Uuid {
    Uuid::now_v7()
}

/// Generate a fresh token id (`jti`). Random, carries no timing information.
pub fn new_token_id() -> String {
    Uuid::new_v4().to_string()
}
