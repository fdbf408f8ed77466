use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Boxed future used at the async trait seams (uploader, publisher,
/// post-processor).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Numeric datatype code as used on the bus and in the repository
/// (e.g. `35010` for mean rate-of-spread rasters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatatypeId(pub u32);

impl DatatypeId {
    /// Sentinel meaning "every output the simulator produces".
    pub const ALL: DatatypeId = DatatypeId(35006);

    pub fn is_all(self) -> bool {
        self == Self::ALL
    }
}

impl fmt::Display for DatatypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for DatatypeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u32>()
            .map(DatatypeId)
            .map_err(|e| format!("invalid datatype code '{s}': {e}"))
    }
}

/// Kind of status update carried by an outbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateType {
    Start,
    Update,
    End,
    Layer,
}

impl Default for UpdateType {
    fn default() -> Self {
        UpdateType::Update
    }
}

/// Status codes used in outbound notifications.
pub const STATUS_OK: u16 = 200;
pub const STATUS_ERROR: u16 = 500;
