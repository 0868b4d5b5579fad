use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Normalised price of the fixed instrument.
///
/// The receipt time lives on the enclosing [`Stamped`](super::Stamped), not here, since the
/// upstream does not report a trustworthy timestamp for this endpoint.
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize, Serialize)]
pub struct PricePoint {
    pub symbol: SmolStr,
    pub price: f64,
}
