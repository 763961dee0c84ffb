//! Identifier generation for tags, branches and call-ids.

use rand::Rng;
use uuid::Uuid;

/// Magic cookie every branch parameter starts with
pub const BRANCH_MAGIC_COOKIE: &str = "z9hG4bK";

/// Generate a From/To tag: 8 lowercase hex characters
pub fn generate_tag() -> String {
    let mut rng = rand::thread_rng();
    format!("{:08x}", rng.gen::<u32>())
}

/// Generate a Via branch parameter with the magic cookie prefix
pub fn generate_branch() -> String {
    let mut rng = rand::thread_rng();
    format!("{}{:016x}", BRANCH_MAGIC_COOKIE, rng.gen::<u64>())
}

/// Generate a call-id scoped to the local host: `<unique>@<host>`
pub fn generate_call_id(local_host: &str) -> String {
    format!("{}@{}", Uuid::new_v4().simple(), local_host)
}
