use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct Health {
    pub status: &'static str,
}

impl Health {
    pub fn from_check(healthy: bool) -> Self {
        Self { status: if healthy { "ok" } else { "unavailable" } }
    }
}
