//! Boron Recycle System
//!
//! Diverted letdown collects in the holdup tanks. Once enough has accumulated the
//! evaporator processes it in a batch, splitting each gallon of feed into boron-free
//! distillate and 7000 ppm concentrate so that dissolved boron is conserved. The
//! distillate is returned to the VCT on demand as makeup water.

use serde::{Deserialize, Serialize};

use crate::config::BrsConfig;
use crate::inventory::mix_ppm;

/// Completed evaporator batch, kept for boron-balance checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchRecord {
    pub started_hr: f64,
    pub completed_hr: f64,
    pub feed_gal: f64,
    /// Dissolved boron in the feed [ppm·gal]
    pub feed_boron: f64,
    pub distillate_gal: f64,
    pub concentrate_gal: f64,
    /// Dissolved boron in both products [ppm·gal]
    pub product_boron: f64,
}

impl BatchRecord {
    /// Flow-weighted feed concentration.
    pub fn feed_ppm(&self) -> f64 {
        if self.feed_gal > 0.0 {
            self.feed_boron / self.feed_gal
        } else {
            0.0
        }
    }

    /// Feed boron not accounted for by the products [ppm·gal]
    pub fn boron_imbalance(&self) -> f64 {
        self.feed_boron - self.product_boron
    }
}

/// What the BRS is asked to do in one step.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BrsInputs {
    pub divert_gal: f64,
    pub divert_ppm: f64,
    /// Distillate the VCT wants back this step [gal]
    pub makeup_request_gal: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrsState {
    pub holdup_gal: f64,
    /// Holdup as a fraction of tank capacity [%]
    pub holdup_level_pct: f64,
    pub holdup_ppm: f64,
    pub distillate_gal: f64,
    pub distillate_ppm: f64,
    pub concentrate_gal: f64,
    pub concentrate_ppm: f64,

    pub inflow_gpm: f64,
    pub return_gpm: f64,
    pub received_total_gal: f64,
    pub returned_total_gal: f64,

    pub evaporator_running: bool,
    current_batch: Option<BatchRecord>,
    pub batches: Vec<BatchRecord>,
    pub holdup_high_alarm: bool,
}

impl BrsState {
    pub fn new(cfg: &BrsConfig) -> Self {
        Self {
            holdup_gal: cfg.initial_holdup_gal,
            holdup_level_pct: holdup_level_pct(cfg.initial_holdup_gal, cfg),
            holdup_ppm: cfg.initial_holdup_ppm,
            distillate_gal: cfg.initial_distillate_gal,
            distillate_ppm: cfg.distillate_ppm,
            concentrate_gal: 0.0,
            concentrate_ppm: cfg.concentrate_ppm,
            inflow_gpm: 0.0,
            return_gpm: 0.0,
            received_total_gal: 0.0,
            returned_total_gal: 0.0,
            evaporator_running: false,
            current_batch: None,
            batches: Vec::new(),
            holdup_high_alarm: false,
        }
    }

    /// Water held in all three inventories [gal]
    pub fn total_gal(&self) -> f64 {
        self.holdup_gal + self.distillate_gal + self.concentrate_gal
    }

    /// Dissolved boron in all three inventories [ppm·gal]
    pub fn total_boron(&self) -> f64 {
        self.holdup_gal * self.holdup_ppm
            + self.distillate_gal * self.distillate_ppm
            + self.concentrate_gal * self.concentrate_ppm
    }

    pub fn batch_in_progress(&self) -> Option<&BatchRecord> {
        self.current_batch.as_ref()
    }

    /// Enough distillate to serve as the makeup source.
    pub fn distillate_ready(&self, cfg: &BrsConfig) -> bool {
        self.distillate_gal >= cfg.min_distillate_for_makeup_gal
    }

    /// Receive diverted letdown into holdup.
    pub fn receive(&mut self, gal: f64, ppm: f64, dt_hr: f64, cfg: &BrsConfig) {
        let dt_min = dt_hr * 60.0;
        if gal <= 0.0 {
            self.inflow_gpm = 0.0;
        } else {
            self.holdup_ppm = mix_ppm(self.holdup_ppm, self.holdup_gal, ppm, gal);
            self.holdup_gal += gal;
            self.received_total_gal += gal;
            self.inflow_gpm = if dt_min > 0.0 { gal / dt_min } else { 0.0 };
        }

        self.holdup_level_pct = holdup_level_pct(self.holdup_gal, cfg);
        let high = self.holdup_level_pct >= cfg.holdup_high_alarm_fraction * 100.0;
        if high && !self.holdup_high_alarm {
            log::warn!(
                "BRS holdup high ({:.0} gal, {:.1}%)",
                self.holdup_gal,
                self.holdup_level_pct
            );
        }
        self.holdup_high_alarm = high;
    }

    /// Advance evaporator batch processing.
    pub fn process(&mut self, time_hr: f64, dt_hr: f64, cfg: &BrsConfig) {
        if !self.evaporator_running && self.holdup_gal >= cfg.batch_start_gal {
            self.evaporator_running = true;
            self.current_batch = Some(BatchRecord {
                started_hr: time_hr,
                completed_hr: time_hr,
                feed_gal: 0.0,
                feed_boron: 0.0,
                distillate_gal: 0.0,
                concentrate_gal: 0.0,
                product_boron: 0.0,
            });
            log::info!("BRS evaporator batch started, holdup {:.0} gal", self.holdup_gal);
        }
        if !self.evaporator_running {
            return;
        }

        let feed = (cfg.evaporator_gpm * dt_hr * 60.0).min(self.holdup_gal).max(0.0);
        if feed > 0.0 {
            let feed_ppm = self.holdup_ppm;
            let (distillate, concentrate) = evaporator_split(feed, feed_ppm, cfg);
            self.holdup_gal -= feed;
            self.holdup_level_pct = holdup_level_pct(self.holdup_gal, cfg);

            self.distillate_ppm =
                mix_ppm(self.distillate_ppm, self.distillate_gal, cfg.distillate_ppm, distillate);
            self.distillate_gal += distillate;
            self.concentrate_ppm = mix_ppm(
                self.concentrate_ppm,
                self.concentrate_gal,
                cfg.concentrate_ppm,
                concentrate,
            );
            self.concentrate_gal += concentrate;

            if let Some(batch) = self.current_batch.as_mut() {
                batch.feed_gal += feed;
                batch.feed_boron += feed * feed_ppm;
                batch.distillate_gal += distillate;
                batch.concentrate_gal += concentrate;
                batch.product_boron +=
                    distillate * cfg.distillate_ppm + concentrate * cfg.concentrate_ppm;
                batch.completed_hr = time_hr + dt_hr;
            }
        }

        if self.holdup_gal < cfg.batch_stop_gal {
            self.evaporator_running = false;
            if let Some(batch) = self.current_batch.take() {
                log::info!(
                    "BRS batch done: {:.0} gal at {:.0} ppm, {:.0} distillate, {:.0} concentrate",
                    batch.feed_gal,
                    batch.feed_ppm(),
                    batch.distillate_gal,
                    batch.concentrate_gal
                );
                self.batches.push(batch);
            }
        }
    }

    /// Withdraw distillate for VCT makeup, clamped to what is available.
    ///
    /// # Returns
    /// Volume actually withdrawn [gal]
    pub fn withdraw(&mut self, requested_gal: f64, dt_hr: f64) -> f64 {
        let dt_min = dt_hr * 60.0;
        let withdrawn = requested_gal.max(0.0).min(self.distillate_gal);
        if withdrawn < requested_gal {
            log::debug!(
                "BRS distillate request {requested_gal:.1} gal clamped to {withdrawn:.1} gal"
            );
        }
        self.distillate_gal -= withdrawn;
        self.returned_total_gal += withdrawn;
        self.return_gpm = if dt_min > 0.0 { withdrawn / dt_min } else { 0.0 };
        withdrawn
    }

    /// One BRS step: receive divert, run the evaporator, then serve makeup.
    ///
    /// # Returns
    /// Distillate withdrawn for the VCT [gal]
    pub fn update(&mut self, inputs: &BrsInputs, time_hr: f64, dt_hr: f64, cfg: &BrsConfig) -> f64 {
        self.receive(inputs.divert_gal, inputs.divert_ppm, dt_hr, cfg);
        self.process(time_hr, dt_hr, cfg);
        self.withdraw(inputs.makeup_request_gal, dt_hr)
    }
}

/// Holdup tank level for a volume, zero for a tank with no capacity.
fn holdup_level_pct(holdup_gal: f64, cfg: &BrsConfig) -> f64 {
    if cfg.holdup_capacity_gal <= 0.0 {
        return 0.0;
    }
    holdup_gal / cfg.holdup_capacity_gal * 100.0
}

/// Split a feed volume into distillate and concentrate conserving dissolved boron.
///
/// `V_c = V_f (C_f - C_d) / (C_c - C_d)`, clamped to `[0, V_f]`.
pub fn evaporator_split(feed_gal: f64, feed_ppm: f64, cfg: &BrsConfig) -> (f64, f64) {
    let span = cfg.concentrate_ppm - cfg.distillate_ppm;
    if span <= 0.0 {
        return (feed_gal, 0.0);
    }
    let concentrate = (feed_gal * (feed_ppm - cfg.distillate_ppm) / span).clamp(0.0, feed_gal);
    (feed_gal - concentrate, concentrate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const DT: f64 = 1.0 / 60.0;

    #[test]
    fn split_conserves_boron() {
        let cfg = BrsConfig::default();
        let (d, c) = evaporator_split(7_000.0, 2_000.0, &cfg);
        assert_relative_eq!(c, 2_000.0, epsilon = 1e-9);
        assert_relative_eq!(d, 5_000.0, epsilon = 1e-9);
        assert_relative_eq!(d * cfg.distillate_ppm + c * cfg.concentrate_ppm, 7_000.0 * 2_000.0);
    }

    #[test]
    fn receive_mixes_and_books() {
        let cfg = BrsConfig::default();
        let mut brs = BrsState::new(&cfg);
        brs.receive(100.0, 2_000.0, DT, &cfg);
        brs.receive(100.0, 1_000.0, DT, &cfg);
        assert_relative_eq!(brs.holdup_gal, 200.0);
        assert_relative_eq!(brs.holdup_ppm, 1_500.0);
        assert_relative_eq!(brs.received_total_gal, 200.0);
        assert_relative_eq!(brs.inflow_gpm, 100.0, epsilon = 1e-9);
    }

    #[test]
    fn batch_runs_to_completion_and_balances_boron() {
        let cfg = BrsConfig::default();
        let mut brs = BrsState::new(&cfg);
        let boron_before = 6_000.0 * 1_800.0 + brs.total_boron();
        let water_before = 6_000.0 + brs.total_gal();
        brs.receive(6_000.0, 1_800.0, DT, &cfg);

        let mut t = 0.0;
        while brs.batches.is_empty() && t < 10.0 {
            brs.process(t, DT, &cfg);
            t += DT;
        }
        assert!(!brs.evaporator_running);
        assert_eq!(brs.batches.len(), 1);
        let batch = &brs.batches[0];
        assert!(brs.holdup_gal < cfg.batch_stop_gal);
        assert_relative_eq!(batch.feed_gal, 6_000.0 - brs.holdup_gal, epsilon = 1e-6);
        assert_relative_eq!(batch.feed_ppm(), 1_800.0, epsilon = 1e-6);
        assert!(batch.boron_imbalance().abs() < 1e-6 * batch.feed_boron);
        assert_relative_eq!(
            batch.concentrate_gal,
            batch.feed_gal * 1_800.0 / 7_000.0,
            epsilon = 1e-6
        );

        // water and boron both conserved across the whole BRS
        assert_relative_eq!(brs.total_gal(), water_before, epsilon = 1e-6);
        assert_relative_eq!(brs.total_boron(), boron_before, max_relative = 1e-9);
    }

    #[test]
    fn small_holdup_does_not_start_batch() {
        let cfg = BrsConfig::default();
        let mut brs = BrsState::new(&cfg);
        brs.receive(1_000.0, 2_000.0, DT, &cfg);
        brs.process(0.0, DT, &cfg);
        assert!(!brs.evaporator_running);
        assert_relative_eq!(brs.holdup_gal, 1_000.0);
    }

    #[test]
    fn withdrawal_is_clamped_to_distillate() {
        let cfg = BrsConfig {
            initial_distillate_gal: 50.0,
            ..BrsConfig::default()
        };
        let mut brs = BrsState::new(&cfg);
        let got = brs.withdraw(80.0, DT);
        assert_relative_eq!(got, 50.0);
        assert_eq!(brs.distillate_gal, 0.0);
        assert_relative_eq!(brs.returned_total_gal, 50.0);
        assert_relative_eq!(brs.return_gpm, 50.0, epsilon = 1e-9);
        assert_eq!(brs.withdraw(80.0, DT), 0.0);
        assert_eq!(brs.return_gpm, 0.0);
    }

    #[test]
    fn holdup_high_alarm() {
        let cfg = BrsConfig {
            holdup_capacity_gal: 1_000.0,
            ..BrsConfig::default()
        };
        let mut brs = BrsState::new(&cfg);
        brs.receive(850.0, 2_000.0, DT, &cfg);
        assert_relative_eq!(brs.holdup_level_pct, 85.0, epsilon = 1e-9);
        assert!(!brs.holdup_high_alarm);
        brs.receive(100.0, 2_000.0, DT, &cfg);
        assert_relative_eq!(brs.holdup_level_pct, 95.0, epsilon = 1e-9);
        assert!(brs.holdup_high_alarm);
    }

    #[test]
    fn holdup_level_follows_receipts_and_evaporation() {
        let cfg = BrsConfig {
            holdup_capacity_gal: 10_000.0,
            ..BrsConfig::default()
        };
        let mut brs = BrsState::new(&cfg);
        assert_eq!(brs.holdup_level_pct, 0.0);
        brs.receive(6_000.0, 2_000.0, DT, &cfg);
        assert_relative_eq!(brs.holdup_level_pct, 60.0, epsilon = 1e-9);

        brs.process(0.0, DT, &cfg);
        assert!(brs.evaporator_running);
        let expected = (6_000.0 - cfg.evaporator_gpm) / 100.0;
        assert_relative_eq!(brs.holdup_level_pct, expected, epsilon = 1e-9);
        assert_relative_eq!(brs.holdup_level_pct, brs.holdup_gal / 100.0, epsilon = 1e-9);

        let empty = BrsConfig {
            holdup_capacity_gal: 0.0,
            ..BrsConfig::default()
        };
        assert_eq!(holdup_level_pct(500.0, &empty), 0.0);
    }
}
