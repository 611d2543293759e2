//! Letdown orifice lineup
//!
//! The operator valves letdown orifices in and out as pressurizer level drifts above
//! its program. Each change is a discrete action guarded by a threshold predicate;
//! closing thresholds sit a hysteresis band below the opening ones so a level that
//! hovers near a threshold does not make the valves chatter. At most one action is
//! taken per evaluation, and orifices close in the reverse order they opened.

use serde::{Deserialize, Serialize};

use crate::config::{LetdownConfig, OrificeConfig};

/// Number of large (75 gpm) orifices in service. Never zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LargeOrifices {
    One,
    Two,
}

impl LargeOrifices {
    pub fn count(self) -> u8 {
        match self {
            LargeOrifices::One => 1,
            LargeOrifices::Two => 2,
        }
    }
}

/// Discrete operator action on the lineup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrificeAction {
    OpenSmall,
    OpenSecondLarge,
    CloseSecondLarge,
    CloseSmall,
}

/// Audit record of one operator action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrificeEvent {
    pub time_hr: f64,
    pub action: OrificeAction,
    /// Level minus program setpoint at the time of the action [%]
    pub level_error_pct: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrificeLineupState {
    pub large_open: LargeOrifices,
    /// Supplemental 45 gpm orifice
    pub small_open: bool,
    pub last_change_hr: Option<f64>,
}

impl OrificeLineupState {
    pub fn new(cfg: &OrificeConfig) -> Self {
        let large_open = if cfg.initial_large_open >= 2 {
            LargeOrifices::Two
        } else {
            LargeOrifices::One
        };
        Self {
            large_open,
            small_open: false,
            last_change_hr: None,
        }
    }

    /// Human-readable lineup, e.g. `"2x75 + 45 gpm"`.
    pub fn describe(&self, letdown: &LetdownConfig) -> String {
        let mut text = format!("{}x{:.0}", self.large_open.count(), letdown.large_orifice_gpm);
        if self.small_open {
            text.push_str(&format!(" + {:.0}", letdown.small_orifice_gpm));
        }
        text.push_str(" gpm");
        text
    }

    /// Guarded transition predicates, evaluated in priority order.
    ///
    /// Closing guards come first so that the reverse-order rule (second large
    /// orifice before the small one) holds even when several guards are true.
    pub fn next_action(&self, level_error_pct: f64, cfg: &OrificeConfig) -> Option<OrificeAction> {
        let close_large_below = cfg.large_open_error_pct - cfg.hysteresis_pct;
        let close_small_below = cfg.small_open_error_pct - cfg.hysteresis_pct;

        if self.large_open == LargeOrifices::Two && level_error_pct < close_large_below {
            return Some(OrificeAction::CloseSecondLarge);
        }
        if self.small_open
            && self.large_open == LargeOrifices::One
            && level_error_pct < close_small_below
        {
            return Some(OrificeAction::CloseSmall);
        }
        if !self.small_open && level_error_pct >= cfg.small_open_error_pct {
            return Some(OrificeAction::OpenSmall);
        }
        if self.large_open == LargeOrifices::One && level_error_pct >= cfg.large_open_error_pct {
            return Some(OrificeAction::OpenSecondLarge);
        }
        None
    }

    fn apply(&mut self, action: OrificeAction) {
        match action {
            OrificeAction::OpenSmall => self.small_open = true,
            OrificeAction::CloseSmall => self.small_open = false,
            OrificeAction::OpenSecondLarge => self.large_open = LargeOrifices::Two,
            OrificeAction::CloseSecondLarge => self.large_open = LargeOrifices::One,
        }
    }

    /// Evaluate the lineup against the current level error and take at most one action.
    ///
    /// Only called in the two-phase regime; during solid plant and bubble drain the
    /// letdown lineup belongs to the regime authority.
    pub fn evaluate(
        &mut self,
        level_pct: f64,
        setpoint_pct: f64,
        time_hr: f64,
        cfg: &OrificeConfig,
    ) -> Option<OrificeEvent> {
        if let Some(last) = self.last_change_hr {
            if time_hr - last < cfg.min_action_interval_hr {
                return None;
            }
        }

        let level_error_pct = level_pct - setpoint_pct;
        let action = self.next_action(level_error_pct, cfg)?;
        self.apply(action);
        self.last_change_hr = Some(time_hr);

        log::info!(
            "orifice lineup: {:?} at level error {:+.2}% (t = {:.3} hr)",
            action,
            level_error_pct,
            time_hr
        );
        Some(OrificeEvent {
            time_hr,
            action,
            level_error_pct,
        })
    }
}
