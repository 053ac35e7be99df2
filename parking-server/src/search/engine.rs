//! Search engine over the spot cache and zone reference store.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::cache::SpotCache;
use crate::domain::{ParkingError, ParkingSpot};
use crate::geo::{Coordinates, MELBOURNE_CBD};
use crate::zones::{ZoneRecord, ZoneReferenceStore};

use super::config::SearchConfig;
use super::cost::{CURRENCY, CostEstimate, estimate_cost};
use super::rank::rank_spots;

const UNKNOWN_RESTRICTION: &str = "Unknown";
const DEFAULT_DAYS: &str = "Daily";

/// A spot joined with its zone restrictions and distance from the query.
#[derive(Debug, Clone, Serialize)]
pub struct EnrichedSpot {
    #[serde(flatten)]
    pub spot: ParkingSpot,
    pub restriction_display: String,
    pub restriction_days: String,
    pub time_restriction_start: String,
    pub time_restriction_finish: String,
    pub distance_km: f64,
}

impl EnrichedSpot {
    fn new(spot: &ParkingSpot, zone: Option<&ZoneRecord>, distance_km: f64) -> Self {
        match zone {
            Some(zone) => Self {
                spot: spot.clone(),
                restriction_display: zone.restriction_display.clone(),
                restriction_days: zone.restriction_days.clone(),
                time_restriction_start: zone.time_restriction_start.clone(),
                time_restriction_finish: zone.time_restriction_finish.clone(),
                distance_km,
            },
            None => Self {
                spot: spot.clone(),
                restriction_display: UNKNOWN_RESTRICTION.to_string(),
                restriction_days: DEFAULT_DAYS.to_string(),
                time_restriction_start: String::new(),
                time_restriction_finish: String::new(),
                distance_km,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ZoneStats {
    pub total_zones: usize,
    pub restriction_type_counts: BTreeMap<String, usize>,
    /// Mean permitted stay over zones whose code encodes one, in hours
    pub average_hours: f64,
}

/// A cached spot and the zone number it carries.
#[derive(Debug, Clone, Serialize)]
pub struct SpotZoneSample {
    pub id: String,
    pub street_name: String,
    pub zone_number: Option<String>,
}

/// A cached spot whose zone number joined a zone record.
#[derive(Debug, Clone, Serialize)]
pub struct MatchedSpot {
    pub id: String,
    pub street_name: String,
    pub zone: ZoneRecord,
}

/// How well live spots join against the zone reference data.
#[derive(Debug, Clone, Serialize)]
pub struct MatchReport {
    pub zones_loaded: usize,
    pub zone_sample: Vec<String>,
    pub spots_total: usize,
    pub spots_with_zone: usize,
    pub matched: usize,
    pub spot_sample: Vec<SpotZoneSample>,
    pub matched_sample: Vec<MatchedSpot>,
}

/// Spot search and enrichment.
///
/// Cheap to clone; shares the cache and zone store.
#[derive(Clone)]
pub struct SearchEngine {
    cache: Arc<SpotCache>,
    zones: ZoneReferenceStore,
    config: SearchConfig,
}

impl SearchEngine {
    pub fn new(cache: Arc<SpotCache>, zones: ZoneReferenceStore, config: SearchConfig) -> Self {
        Self {
            cache,
            zones,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Spots within `radius_km` of `point`, nearest first.
    ///
    /// Uses the cache's serve rule, so a stale snapshot triggers a refresh
    /// and a failed refresh falls back to the previous data.
    pub async fn search(
        &self,
        point: Coordinates,
        radius_km: f64,
    ) -> Result<Vec<EnrichedSpot>, ParkingError> {
        let served = self.cache.serve().await?;
        let zones = self.zones.snapshot().await;

        let mut spots: Vec<EnrichedSpot> = served
            .snapshot
            .spots
            .iter()
            .filter_map(|spot| {
                let distance = spot.distance_from(&point);
                (distance <= radius_km).then(|| {
                    let zone = spot.zone_number.as_deref().and_then(|z| zones.get(z));
                    EnrichedSpot::new(spot, zone, distance)
                })
            })
            .collect();

        spots.sort_by(|a, b| a.distance_km.total_cmp(&b.distance_km));

        debug!(
            lat = point.latitude,
            lng = point.longitude,
            radius_km,
            found = spots.len(),
            "spot search"
        );
        Ok(spots)
    }

    /// The best `limit` spots near `point` by restriction rank, then distance.
    pub async fn recommend(
        &self,
        point: Coordinates,
        limit: usize,
    ) -> Result<Vec<EnrichedSpot>, ParkingError> {
        let mut spots = self.search(point, self.config.recommend_radius_km).await?;
        rank_spots(&mut spots);
        spots.truncate(limit);
        Ok(spots)
    }

    /// Estimated cost of parking in `zone_id` for `duration_hours`.
    pub async fn cost(
        &self,
        zone_id: &str,
        duration_hours: f64,
    ) -> Result<CostEstimate, ParkingError> {
        let zone = self
            .zones
            .get(zone_id)
            .await
            .ok_or_else(|| ParkingError::UnknownZone {
                zone_id: zone_id.to_string(),
            })?;

        Ok(CostEstimate {
            zone_id: zone.zone_id,
            cost: estimate_cost(&zone.restriction_display, duration_hours),
            restriction_display: zone.restriction_display,
            duration: duration_hours,
            currency: CURRENCY.to_string(),
        })
    }

    pub async fn zone_stats(&self) -> ZoneStats {
        let zones = self.zones.snapshot().await;

        let mut counts = BTreeMap::new();
        for zone in zones.values() {
            *counts.entry(zone.restriction_display.clone()).or_insert(0) += 1;
        }

        let hours: Vec<f64> = zones.values().filter_map(ZoneRecord::permitted_hours).collect();
        let average_hours = if hours.is_empty() {
            0.0
        } else {
            hours.iter().sum::<f64>() / hours.len() as f64
        };

        ZoneStats {
            total_zones: zones.len(),
            restriction_type_counts: counts,
            average_hours,
        }
    }

    /// One spot, by any of its identifiers, joined with its zone.
    ///
    /// Distance is measured from the Melbourne CBD. `Ok(None)` when no
    /// cached spot carries the id.
    pub async fn spot_details(&self, id: &str) -> Result<Option<EnrichedSpot>, ParkingError> {
        let served = self.cache.serve().await?;
        let Some(spot) = served.snapshot.spots.iter().find(|s| s.has_id(id)) else {
            return Ok(None);
        };

        let zones = self.zones.snapshot().await;
        let zone = spot.zone_number.as_deref().and_then(|z| zones.get(z));
        Ok(Some(EnrichedSpot::new(
            spot,
            zone,
            spot.distance_from(&MELBOURNE_CBD),
        )))
    }

    /// Join diagnostics between live spots and zone records.
    pub async fn match_report(&self, sample: usize) -> Result<MatchReport, ParkingError> {
        let served = self.cache.serve().await?;
        let zones = self.zones.snapshot().await;
        Ok(build_match_report(&served.snapshot.spots, &zones, sample))
    }
}

fn build_match_report(
    spots: &[ParkingSpot],
    zones: &HashMap<String, ZoneRecord>,
    sample: usize,
) -> MatchReport {
    let mut zone_sample: Vec<String> = zones.keys().cloned().collect();
    zone_sample.sort();
    zone_sample.truncate(sample);

    let with_zone: Vec<&ParkingSpot> = spots.iter().filter(|s| s.zone_number.is_some()).collect();
    let matched: Vec<(&ParkingSpot, &ZoneRecord)> = with_zone
        .iter()
        .filter_map(|spot| {
            let zone = zones.get(spot.zone_number.as_deref()?)?;
            Some((*spot, zone))
        })
        .collect();

    MatchReport {
        zones_loaded: zones.len(),
        zone_sample,
        spots_total: spots.len(),
        spots_with_zone: with_zone.len(),
        matched: matched.len(),
        spot_sample: spots
            .iter()
            .take(sample)
            .map(|s| SpotZoneSample {
                id: s.id.clone(),
                street_name: s.street_name.clone(),
                zone_number: s.zone_number.clone(),
            })
            .collect(),
        matched_sample: matched
            .into_iter()
            .take(sample)
            .map(|(spot, zone)| MatchedSpot {
                id: spot.id.clone(),
                street_name: spot.street_name.clone(),
                zone: zone.clone(),
            })
            .collect(),
    }
}
