//! Standard function block state machines
//!
//! Each built-in FB type is a small state machine over its persistent
//! instance record: latched inputs, edge memories and output fields all
//! live here and survive across scans. The record's declared kind, not
//! the instance name, selects the machine.

use serde::{Deserialize, Serialize};

/// TON on-delay timer instance record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimerInstance {
    /// Latched IN input
    pub input: bool,
    /// Latched preset time in ms
    pub preset_ms: u64,
    /// Q output
    pub q: bool,
    /// Elapsed time in ms; never exceeds the preset
    pub elapsed_ms: u64,
    /// True while integrating toward the preset
    pub running: bool,
    /// IN as seen at the end of the previous call
    pub prev_input: bool,
}

impl TimerInstance {
    pub fn new(preset_ms: u64) -> Self {
        Self {
            preset_ms,
            ..Self::default()
        }
    }

    /// One call of the on-delay machine, integrating `delta_ms`
    ///
    /// A rising edge restarts integration and consumes the same call's
    /// delta, so with PT = 500 and a 100 ms scan the edge scan already
    /// shows ET = 100. Q drops immediately on the falling edge of IN.
    pub fn update(&mut self, delta_ms: u64) {
        let rising = self.input && !self.prev_input;
        let falling = !self.input && self.prev_input;

        if rising {
            self.elapsed_ms = 0;
            if self.preset_ms == 0 {
                self.q = true;
                self.running = false;
            } else {
                self.running = true;
                self.q = false;
            }
        } else if falling {
            self.running = false;
            self.elapsed_ms = 0;
            self.q = false;
        }

        if self.running {
            self.elapsed_ms = (self.elapsed_ms + delta_ms).min(self.preset_ms);
            if self.elapsed_ms >= self.preset_ms {
                self.q = true;
                self.running = false;
            }
        }

        self.prev_input = self.input;
    }
}

/// Which counter machine a counter record runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CounterKind {
    Up,
    Down,
    UpDown,
}

/// CTU / CTD / CTUD instance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CounterInstance {
    pub kind: CounterKind,
    /// Latched CU input
    pub count_up: bool,
    /// Latched CD input
    pub count_down: bool,
    /// Latched R input
    pub reset: bool,
    /// Latched LD input
    pub load: bool,
    /// Latched preset value
    pub preset: i64,
    /// Current count; clamped at zero on the down side
    pub current: i64,
    /// QU output: CV >= PV
    pub qu: bool,
    /// QD output: CV <= 0
    pub qd: bool,
    prev_cu: bool,
    prev_cd: bool,
}

impl CounterInstance {
    pub fn new(kind: CounterKind) -> Self {
        Self {
            kind,
            count_up: false,
            count_down: false,
            reset: false,
            load: false,
            preset: 0,
            current: 0,
            qu: false,
            qd: true,
            prev_cu: false,
            prev_cd: false,
        }
    }

    /// One CTU call with the sampled input levels
    pub fn count_up_call(&mut self, cu: bool, reset: bool, preset: i64) {
        self.preset = preset;
        self.reset = reset;
        self.count_up = cu;
        let rising = cu && !self.prev_cu;

        if reset {
            self.current = 0;
        } else if rising {
            self.current = self.current.wrapping_add(1);
        }

        self.qu = self.current >= self.preset;
        self.prev_cu = cu;
    }

    /// One CTD call with the sampled input levels
    pub fn count_down_call(&mut self, cd: bool, load: bool, preset: i64) {
        self.preset = preset;
        self.load = load;
        self.count_down = cd;

        if load {
            self.current = self.preset;
            self.qd = self.current <= 0;
            self.prev_cd = cd;
            return;
        }

        let rising = cd && !self.prev_cd;
        if rising {
            self.current = (self.current - 1).max(0);
        }

        self.qd = self.current <= 0;
        self.prev_cd = cd;
    }

    /// Host-level reset, valid for any counter kind: zero the count
    /// and recompute the outputs. Latched inputs and edge memories are
    /// left alone, so the next call still detects edges against the
    /// pre-reset levels.
    pub fn reset(&mut self) {
        self.current = 0;
        self.qu = self.current >= self.preset;
        self.qd = self.current <= 0;
    }

    /// One CTUD call: reset wins over load, then both edges apply
    pub fn count_up_down_call(
        &mut self,
        cu: bool,
        cd: bool,
        reset: bool,
        load: bool,
        preset: i64,
    ) {
        self.preset = preset;
        self.reset = reset;
        self.load = load;
        self.count_up = cu;
        self.count_down = cd;

        let cu_rising = cu && !self.prev_cu;
        let cd_rising = cd && !self.prev_cd;

        if reset {
            self.current = 0;
        } else if load {
            self.current = self.preset;
        } else {
            if cu_rising {
                self.current = self.current.wrapping_add(1);
            }
            if cd_rising {
                self.current = (self.current - 1).max(0);
            }
        }

        self.qu = self.current >= self.preset;
        self.qd = self.current <= 0;
        self.prev_cu = cu;
        self.prev_cd = cd;
    }
}

/// Which edge a detector record reacts to; fixed by the declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EdgeKind {
    Rising,
    Falling,
}

/// R_TRIG / F_TRIG instance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeInstance {
    pub kind: EdgeKind,
    /// Latched CLK input
    pub clk: bool,
    /// Q output: true for at most one call per edge
    pub q: bool,
    /// Memory of CLK from the previous call
    memory: bool,
}

impl EdgeInstance {
    pub fn new(kind: EdgeKind) -> Self {
        Self {
            kind,
            clk: false,
            q: false,
            memory: false,
        }
    }

    /// One call with the sampled CLK level
    pub fn update(&mut self, clk: bool) {
        self.q = match self.kind {
            EdgeKind::Rising => clk && !self.memory,
            EdgeKind::Falling => !clk && self.memory,
        };
        self.memory = clk;
        self.clk = clk;
    }
}

/// Which input dominates a bistable record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BistableKind {
    SetDominant,
    ResetDominant,
}

/// SR / RS instance record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BistableInstance {
    pub kind: BistableKind,
    /// Latched set input (S1 for SR, S for RS)
    pub set: bool,
    /// Latched reset input (R for SR, R1 for RS)
    pub reset: bool,
    /// Q1 output
    pub q1: bool,
}

impl BistableInstance {
    pub fn new(kind: BistableKind) -> Self {
        Self {
            kind,
            set: false,
            reset: false,
            q1: false,
        }
    }

    /// One call with the sampled set/reset levels
    pub fn update(&mut self, set: bool, reset: bool) {
        self.set = set;
        self.reset = reset;
        match self.kind {
            BistableKind::SetDominant => {
                if set {
                    self.q1 = true;
                } else if reset {
                    self.q1 = false;
                }
            }
            BistableKind::ResetDominant => {
                if reset {
                    self.q1 = false;
                } else if set {
                    self.q1 = true;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn timer_call(t: &mut TimerInstance, input: bool, preset: u64, delta: u64) {
        t.input = input;
        t.preset_ms = preset;
        t.update(delta);
    }

    #[test]
    fn test_ton_integrates_from_the_rising_edge_scan() {
        let mut t = TimerInstance::new(0);
        for expected in [100, 200, 300, 400] {
            timer_call(&mut t, true, 500, 100);
            assert_eq!(t.elapsed_ms, expected);
            assert!(!t.q);
        }
        timer_call(&mut t, true, 500, 100);
        assert_eq!(t.elapsed_ms, 500);
        assert!(t.q);

        // Holding IN keeps Q and ET pinned at the preset
        timer_call(&mut t, true, 500, 100);
        assert_eq!(t.elapsed_ms, 500);
        assert!(t.q);
    }

    #[test]
    fn test_ton_q_drops_immediately_on_falling_edge() {
        let mut t = TimerInstance::new(0);
        for _ in 0..5 {
            timer_call(&mut t, true, 500, 100);
        }
        assert!(t.q);
        timer_call(&mut t, false, 500, 100);
        assert!(!t.q);
        assert_eq!(t.elapsed_ms, 0);
    }

    #[test]
    fn test_ton_zero_preset_asserts_q_on_the_edge_scan() {
        let mut t = TimerInstance::new(0);
        timer_call(&mut t, true, 0, 100);
        assert!(t.q);
        assert_eq!(t.elapsed_ms, 0);
    }

    #[test]
    fn test_ton_interrupted_before_preset_resets() {
        let mut t = TimerInstance::new(0);
        timer_call(&mut t, true, 500, 100);
        timer_call(&mut t, true, 500, 100);
        timer_call(&mut t, false, 500, 100);
        assert!(!t.q);
        assert_eq!(t.elapsed_ms, 0);
        // A fresh rising edge starts over
        timer_call(&mut t, true, 500, 100);
        assert_eq!(t.elapsed_ms, 100);
    }

    #[test]
    fn test_ton_et_never_exceeds_preset() {
        let mut t = TimerInstance::new(0);
        timer_call(&mut t, true, 250, 100);
        timer_call(&mut t, true, 250, 100);
        timer_call(&mut t, true, 250, 100);
        assert_eq!(t.elapsed_ms, 250);
        assert!(t.q);
    }

    #[test]
    fn test_ton_lowering_pt_below_et_fires_on_next_call() {
        let mut t = TimerInstance::new(0);
        timer_call(&mut t, true, 500, 100);
        timer_call(&mut t, true, 500, 100);
        timer_call(&mut t, true, 500, 100);
        assert_eq!(t.elapsed_ms, 300);
        // Preset lowered mid-flight; the next integration step reaches it
        timer_call(&mut t, true, 200, 100);
        assert!(t.q);
        assert_eq!(t.elapsed_ms, 200);
    }

    #[test]
    fn test_ctu_counts_only_on_rising_edges() {
        let mut c = CounterInstance::new(CounterKind::Up);
        for _ in 0..10 {
            c.count_up_call(true, false, 3);
        }
        assert_eq!(c.current, 1);
        assert!(!c.qu);
    }

    #[test]
    fn test_ctu_reaches_preset_after_three_edges() {
        let mut c = CounterInstance::new(CounterKind::Up);
        for (cu, expected_cv) in [(true, 1), (false, 1), (true, 2), (false, 2), (true, 3)] {
            c.count_up_call(cu, false, 3);
            assert_eq!(c.current, expected_cv);
        }
        assert!(c.qu);
    }

    #[test]
    fn test_ctu_reset_clears_count_within_the_call() {
        let mut c = CounterInstance::new(CounterKind::Up);
        c.count_up_call(true, false, 2);
        c.count_up_call(false, false, 2);
        c.count_up_call(true, false, 2);
        assert_eq!(c.current, 2);
        assert!(c.qu);
        c.count_up_call(true, true, 2);
        assert_eq!(c.current, 0);
        assert!(!c.qu);
    }

    #[test]
    fn test_ctu_qu_with_zero_preset_is_true_after_reset() {
        let mut c = CounterInstance::new(CounterKind::Up);
        c.count_up_call(false, true, 0);
        assert!(c.qu);
    }

    #[test]
    fn test_ctd_load_then_count_down_to_zero() {
        let mut c = CounterInstance::new(CounterKind::Down);
        c.count_down_call(false, true, 2);
        assert_eq!(c.current, 2);
        assert!(!c.qd);

        c.count_down_call(true, false, 2);
        assert_eq!(c.current, 1);
        c.count_down_call(false, false, 2);
        c.count_down_call(true, false, 2);
        assert_eq!(c.current, 0);
        assert!(c.qd);
    }

    #[test]
    fn test_ctd_clamps_at_zero() {
        let mut c = CounterInstance::new(CounterKind::Down);
        for i in 0..6 {
            c.count_down_call(i % 2 == 0, false, 3);
        }
        assert_eq!(c.current, 0);
        assert!(c.qd);
    }

    #[test]
    fn test_reset_zeroes_any_counter_kind() {
        let mut up = CounterInstance::new(CounterKind::Up);
        up.count_up_call(true, false, 2);
        up.count_up_call(false, false, 2);
        up.count_up_call(true, false, 2);
        assert!(up.qu);
        up.reset();
        assert_eq!(up.current, 0);
        assert!(!up.qu);
        assert!(up.qd);

        let mut down = CounterInstance::new(CounterKind::Down);
        down.count_down_call(false, true, 3);
        assert_eq!(down.current, 3);
        assert!(!down.qd);
        down.reset();
        assert_eq!(down.current, 0);
        assert!(down.qd);
    }

    #[test]
    fn test_reset_keeps_edge_memory() {
        let mut c = CounterInstance::new(CounterKind::Up);
        c.count_up_call(true, false, 5);
        assert_eq!(c.current, 1);
        c.reset();
        // CU is still high from before the reset: no fresh edge yet
        c.count_up_call(true, false, 5);
        assert_eq!(c.current, 0);
        c.count_up_call(false, false, 5);
        c.count_up_call(true, false, 5);
        assert_eq!(c.current, 1);
    }

    #[test]
    fn test_ctud_reset_beats_load() {
        let mut c = CounterInstance::new(CounterKind::UpDown);
        c.count_up_down_call(false, false, true, true, 5);
        assert_eq!(c.current, 0);
        assert!(!c.qu);
        assert!(c.qd);
    }

    #[test]
    fn test_ctud_up_and_down_edges_in_one_call() {
        let mut c = CounterInstance::new(CounterKind::UpDown);
        c.count_up_down_call(false, false, false, true, 5);
        assert_eq!(c.current, 5);
        c.count_up_down_call(true, true, false, false, 5);
        assert_eq!(c.current, 5);
        assert!(c.qu);
    }

    #[test]
    fn test_rtrig_pulses_for_exactly_one_call() {
        let mut e = EdgeInstance::new(EdgeKind::Rising);
        e.update(true);
        assert!(e.q);
        e.update(true);
        assert!(!e.q);
        e.update(false);
        assert!(!e.q);
        e.update(true);
        assert!(e.q);
    }

    #[test]
    fn test_ftrig_detects_falling_edges_regardless_of_name() {
        let mut e = EdgeInstance::new(EdgeKind::Falling);
        e.update(true);
        assert!(!e.q);
        e.update(false);
        assert!(e.q);
        e.update(false);
        assert!(!e.q);
    }

    #[test]
    fn test_sr_is_set_dominant() {
        let mut b = BistableInstance::new(BistableKind::SetDominant);
        b.update(true, true);
        assert!(b.q1);
        b.update(false, true);
        assert!(!b.q1);
        b.update(false, false);
        assert!(!b.q1);
    }

    #[test]
    fn test_rs_is_reset_dominant() {
        let mut b = BistableInstance::new(BistableKind::ResetDominant);
        b.update(true, false);
        assert!(b.q1);
        b.update(true, true);
        assert!(!b.q1);
    }
}
