use std::time::Duration;

use crate::types::Bbo;
use crate::venues::VenueAdapter;

/// Dual-venue BBO cache refreshed once per supervisor tick. The maker side
/// is a synchronous pull, the taker side a push-cache read; a venue that
/// yields nothing this tick keeps its previous snapshot, so `is_ready`
/// reflects the best data available rather than the last round-trip.
#[derive(Default)]
pub struct BookCache {
    maker: Option<Bbo>,
    taker: Option<Bbo>,
}

impl BookCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn refresh<M, T>(&mut self, maker: &M, taker: &T) -> bool
    where
        M: VenueAdapter + ?Sized,
        T: VenueAdapter + ?Sized,
    {
        if let Some(bbo) = maker.get_bbo().await {
            self.maker = Some(bbo);
        }
        if let Some(bbo) = taker.get_bbo().await {
            self.taker = Some(bbo);
        }
        self.is_ready()
    }

    /// Both venues present with two-sided books.
    pub fn is_ready(&self) -> bool {
        matches!(&self.maker, Some(b) if b.is_complete())
            && matches!(&self.taker, Some(b) if b.is_complete())
    }

    pub fn maker(&self) -> Option<&Bbo> {
        self.maker.as_ref()
    }

    pub fn taker(&self) -> Option<&Bbo> {
        self.taker.as_ref()
    }

    pub fn maker_age(&self) -> Option<Duration> {
        self.maker.as_ref().map(|b| b.age())
    }

    pub fn taker_age(&self) -> Option<Duration> {
        self.taker.as_ref().map(|b| b.age())
    }
}
